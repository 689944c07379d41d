// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP API for the RambuID mobile app

mod detect;
mod extract;
mod jelajahi;
mod rambu;
mod upload;
mod users;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::PasswordHasher;
use crate::config::AppConfig;
use crate::db::{Database, Stats};
use crate::detect::{DetectorHandle, SignDetector};
use crate::storage::{ImageStore, STATIC_PREFIX};
use crate::{RambuError, Result};

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub images: ImageStore,
    pub hasher: PasswordHasher,
    pub detector: DetectorHandle,
}

impl AppState {
    /// State whose detector connects lazily on the first detection request
    pub fn new(config: AppConfig, db: Database) -> Result<Self> {
        let detector = DetectorHandle::new(config.detector.clone());
        Self::build(config, db, detector)
    }

    /// State with an already constructed detector
    pub fn with_detector(
        config: AppConfig,
        db: Database,
        detector: Arc<dyn SignDetector>,
    ) -> Result<Self> {
        let detector = DetectorHandle::preloaded(config.detector.clone(), detector);
        Self::build(config, db, detector)
    }

    fn build(config: AppConfig, db: Database, detector: DetectorHandle) -> Result<Self> {
        let images = ImageStore::new(&config.storage.static_dir, &config.uploads.allowed_extensions)?;
        let hasher = PasswordHasher::new(config.security.pbkdf2_rounds);
        Ok(Self {
            db,
            config,
            images,
            hasher,
            detector,
        })
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(state.images.root());
    let body_limit = state.config.uploads.max_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Auth
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        // Signs
        .route("/rambu", get(rambu::list).post(rambu::create))
        .route("/rambu/", get(rambu::list).post(rambu::create))
        .route("/rambu/:id", get(rambu::get_one).put(rambu::update).delete(rambu::remove))
        // Sightings
        .route("/jelajahi", get(jelajahi::list).post(jelajahi::create))
        .route("/jelajahi/", get(jelajahi::list).post(jelajahi::create))
        .route(
            "/jelajahi/:id",
            get(jelajahi::get_one).put(jelajahi::update).delete(jelajahi::remove),
        )
        // Users and profiles
        .route("/users", get(users::list))
        .route("/users/", get(users::list))
        .route(
            "/users/:id/profile",
            get(users::profile).put(users::update_profile).delete(users::delete_account),
        )
        .route(
            "/users/:id/profile-image",
            put(users::upload_profile_image).delete(users::delete_profile_image),
        )
        .route("/stats", get(stats))
        .route("/stats/", get(stats))
        // Detection
        .route("/deteksi-rambu", post(detect::detect_sign))
        .route("/deteksi-rambu/", post(detect::detect_sign))
        .nest_service(STATIC_PREFIX, static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Server Rambuid Berjalan!" }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Backend is running",
        "detector": {
            "backend": state.detector.config().backend,
            "loaded": state.detector.is_loaded(),
        },
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Stats>> {
    Ok(Json(state.db.stats()?))
}

/// Start the web server with config and database
pub async fn start_server(config: AppConfig, db: Database) -> Result<()> {
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, db)?);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("RambuID API listening on http://{}", addr);
    info!("Serving uploads from {:?}", state.images.root());

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RambuError::Config(format!("Server error: {}", e)))?;

    info!("RambuID stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

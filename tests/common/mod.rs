// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use rambuid::config::AppConfig;
use rambuid::db::Database;
use rambuid::detect::{Detection, PreparedImage, SignDetector};
use rambuid::web::{create_router, AppState};

const BOUNDARY: &str = "rambuid-test-boundary";

/// Detector that always reports the same boxes
pub struct StubDetector(pub Vec<Detection>);

#[async_trait]
impl SignDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn health_check(&self) -> rambuid::Result<()> {
        Ok(())
    }

    async fn detect(&self, _image: &PreparedImage) -> rambuid::Result<Vec<Detection>> {
        Ok(self.0.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    _static_dir: TempDir,
}

pub fn test_config(static_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.static_dir = static_dir.path().to_string_lossy().to_string();
    config.security.pbkdf2_rounds = 1_000;
    config
}

/// App with an in-memory database and a stub detector
pub fn spawn_app(detections: Vec<Detection>) -> TestApp {
    let static_dir = TempDir::new().unwrap();
    let config = test_config(&static_dir);
    let db = Database::in_memory().unwrap();
    let state = Arc::new(
        AppState::with_detector(config, db, Arc::new(StubDetector(detections))).unwrap(),
    );
    TestApp {
        router: create_router(state.clone()),
        state,
        _static_dir: static_dir,
    }
}

/// App whose detector has to be reached over the network
pub fn spawn_app_with_config(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let static_dir = TempDir::new().unwrap();
    let mut config = test_config(&static_dir);
    configure(&mut config);
    let state = Arc::new(AppState::new(config, Database::in_memory().unwrap()).unwrap());
    TestApp {
        router: create_router(state.clone()),
        state,
        _static_dir: static_dir,
    }
}

impl TestApp {
    /// Send a request, returning the status and the body parsed as JSON
    /// (`Value::Null` for non-JSON bodies)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(empty(Method::GET, uri)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(empty(Method::DELETE, uri)).await
    }

    /// Register an account and return its id
    pub async fn register(&self, username: &str, password: &str) -> i64 {
        let (status, body) = self
            .send(json(
                Method::POST,
                "/register",
                serde_json::json!({ "username": username, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["user_id"].as_i64().unwrap()
    }

    /// Create a sign through the API and return its JSON
    pub async fn create_sign(&self, nama: &str, kategori: &str) -> Value {
        let image = png(8, 8);
        let (status, body) = self
            .send(multipart(
                Method::POST,
                "/rambu/",
                &[("nama", nama), ("kategori", kategori), ("deskripsi", "Contoh")],
                &[("gambar", "rambu.png", &image[..])],
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    /// Whether the file behind a public image path exists on disk
    pub fn image_exists(&self, public_path: &str) -> bool {
        self.state
            .images
            .resolve(public_path)
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}

pub fn empty(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a multipart/form-data request from text fields and `(field, filename, bytes)` files
pub fn multipart(
    method: Method,
    uri: &str,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([220, 30, 30]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

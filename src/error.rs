// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for RambuID

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Result type alias for RambuID operations
pub type Result<T> = std::result::Result<T, RambuError>;

/// RambuID error types
///
/// The first group are domain errors and reach the client as 4xx with their
/// message. Everything else is reported as a 500.
#[derive(Error, Debug)]
pub enum RambuError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Username sudah terdaftar!")]
    UsernameTaken,

    #[error("Username atau Password salah!")]
    InvalidCredentials,

    #[error("Kategori tidak valid. Pilih salah satu: {0}")]
    InvalidCategory(String),

    #[error("Koordinat tidak valid: {0}")]
    InvalidCoordinates(String),

    #[error("Format file tidak didukung. Gunakan JPG, PNG, GIF, atau WEBP")]
    UnsupportedFileType(String),

    #[error("Detector not available: {0}")]
    DetectorUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RambuError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            RambuError::BadRequest(_)
            | RambuError::UsernameTaken
            | RambuError::InvalidCredentials
            | RambuError::InvalidCategory(_)
            | RambuError::InvalidCoordinates(_)
            | RambuError::UnsupportedFileType(_)
            | RambuError::Multipart(_) => StatusCode::BAD_REQUEST,
            RambuError::NotFound(_) => StatusCode::NOT_FOUND,
            RambuError::DetectorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for RambuError {
    fn from(rejection: JsonRejection) -> Self {
        RambuError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for RambuError {
    fn from(rejection: PathRejection) -> Self {
        RambuError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RambuError {
    fn from(rejection: QueryRejection) -> Self {
        RambuError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for RambuError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

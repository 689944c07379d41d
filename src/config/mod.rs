// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for RambuID

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{RambuError, Result};

/// Upper bound for `detector.retries`
pub const MAX_RETRIES: u32 = 10;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Static file tree for uploaded images
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload validation
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Password hashing settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Sign detector settings
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root of the tree served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// PBKDF2-SHA256 iteration count for new hashes
    #[serde(default = "default_rounds")]
    pub pbkdf2_rounds: u32,
}

/// Which detector backend serves `/deteksi-rambu/`
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorBackend {
    /// HTTP inference server hosting the pretrained detector
    Yolo,
    /// Local vision model through the Ollama API
    Ollama,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_backend")]
    pub backend: DetectorBackend,
    #[serde(default = "default_detector_url")]
    pub url: String,
    /// Vision model name, only used by the Ollama backend
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Longest image side sent to the model
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Keep photos sent to the detector under `images/uploads`
    #[serde(default)]
    pub keep_uploads: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_db_path() -> String { "rambuid.db".to_string() }
fn default_static_dir() -> String { "static".to_string() }
fn default_max_bytes() -> usize { 10 * 1024 * 1024 }
fn default_rounds() -> u32 { 29_000 }
fn default_backend() -> DetectorBackend { DetectorBackend::Yolo }
fn default_detector_url() -> String { "http://localhost:9000".to_string() }
fn default_vision_model() -> String { "moondream".to_string() }
fn default_min_confidence() -> f32 { 0.25 }
fn default_input_size() -> u32 { 640 }
fn default_timeout() -> u64 { 60 }
fn default_retries() -> u32 { 2 }

fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_extensions(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_rounds: default_rounds(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_detector_url(),
            model: default_vision_model(),
            min_confidence: default_min_confidence(),
            input_size: default_input_size(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            keep_uploads: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| RambuError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RambuError::Config("server.port must be non-zero".to_string()));
        }
        if self.database.path.trim().is_empty() {
            return Err(RambuError::Config("database.path is empty".to_string()));
        }
        if self.uploads.allowed_extensions.is_empty() {
            return Err(RambuError::Config(
                "uploads.allowed_extensions must list at least one extension".to_string(),
            ));
        }
        if self.security.pbkdf2_rounds == 0 {
            return Err(RambuError::Config("security.pbkdf2_rounds must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(RambuError::Config(format!(
                "detector.min_confidence {} is outside 0.0-1.0",
                self.detector.min_confidence
            )));
        }
        if self.detector.input_size < 32 {
            return Err(RambuError::Config("detector.input_size is too small".to_string()));
        }
        if self.detector.retries > MAX_RETRIES {
            return Err(RambuError::Config(format!(
                "detector.retries must be at most {}",
                MAX_RETRIES
            )));
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

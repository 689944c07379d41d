// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image storage under the static file tree

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{RambuError, Result};

/// URL prefix the static tree is mounted under
pub const STATIC_PREFIX: &str = "/static";

/// Subdirectory of `images/` an upload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Catalogue sign pictures
    Rambu,
    /// Photos sent to the detector
    Uploads,
    /// User profile pictures
    Profiles,
}

impl ImageKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Rambu => "rambu",
            ImageKind::Uploads => "uploads",
            ImageKind::Profiles => "profiles",
        }
    }

    const ALL: [ImageKind; 3] = [ImageKind::Rambu, ImageKind::Uploads, ImageKind::Profiles];
}

/// Writes uploaded images to disk and hands back their public paths
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl ImageStore {
    /// Create the store, making `images/{rambu,uploads,profiles}` if needed
    pub fn new<P: AsRef<Path>>(static_root: P, allowed_extensions: &[String]) -> Result<Self> {
        let root = static_root.as_ref().to_path_buf();
        for kind in ImageKind::ALL {
            let dir = root.join("images").join(kind.dir_name());
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created image directory: {:?}", dir);
            }
        }

        Ok(Self {
            root,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    /// Static tree root on disk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the lowercased extension (with dot) if the allow-list permits it
    pub fn validate_extension(&self, filename: &str) -> Result<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| RambuError::UnsupportedFileType(filename.to_string()))?;

        if self.allowed_extensions.iter().any(|a| a == &ext) {
            Ok(format!(".{}", ext))
        } else {
            Err(RambuError::UnsupportedFileType(filename.to_string()))
        }
    }

    /// Save an upload under a generated name and return its public path
    pub async fn save(&self, kind: ImageKind, filename: &str, data: &[u8]) -> Result<String> {
        let ext = self.validate_extension(filename)?;
        if data.is_empty() {
            return Err(RambuError::BadRequest("File kosong".to_string()));
        }

        let unique = format!("{}{}", Uuid::new_v4(), ext);
        let path = self.root.join("images").join(kind.dir_name()).join(&unique);
        tokio::fs::write(&path, data).await?;
        debug!("Stored {} bytes at {:?}", data.len(), path);

        Ok(format!("{}/images/{}/{}", STATIC_PREFIX, kind.dir_name(), unique))
    }

    /// Delete the file behind a public path.
    ///
    /// External URLs and paths that escape the static tree are left alone.
    pub async fn remove(&self, public_path: &str) -> Result<()> {
        let Some(path) = self.resolve(public_path) else {
            debug!("Not removing non-local image: {}", public_path);
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed image {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image already missing: {:?}", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a public path like `/static/images/rambu/x.png` to a file on disk
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        if public_path.starts_with("http://") || public_path.starts_with("https://") {
            return None;
        }

        let trimmed = public_path.trim_start_matches('/');
        let relative = trimmed
            .strip_prefix(STATIC_PREFIX.trim_start_matches('/'))
            .map(|r| r.trim_start_matches('/'))
            .unwrap_or(trimmed);

        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || relative.components().any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(relative))
    }
}

/// Ensure a stored image path is served from the site root
pub fn normalize_public_path(path: String) -> String {
    if path.starts_with("http") || path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

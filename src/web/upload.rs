// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Multipart form collection

use axum::body::Bytes;
use axum::extract::Multipart;
use std::collections::HashMap;

use crate::{RambuError, Result};

/// A file part of a multipart form
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Text fields and files of one multipart request
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl UploadForm {
    /// Drain the whole multipart stream.
    ///
    /// File parts sent without a name and without content (how some clients
    /// encode "no file") are dropped.
    pub async fn collect(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await?;
                    if filename.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { filename, data });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Optional text field; blank values count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Text field as sent, trimmed; `Some("")` when present but blank
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim())
    }

    pub fn require_text(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| RambuError::BadRequest(format!("Field '{}' wajib diisi", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<UploadedFile> {
        self.take_file(name)
            .ok_or_else(|| RambuError::BadRequest(format!("File '{}' wajib diunggah", name)))
    }
}

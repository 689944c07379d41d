// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sign catalogue handlers

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::extract::{PathId, QueryParams};
use super::upload::UploadForm;
use super::AppState;
use crate::db::{Category, NewSign, Sign, SignUpdate};
use crate::storage::ImageKind;
use crate::{RambuError, Result};

#[derive(Deserialize)]
pub struct ListQuery {
    kategori: Option<String>,
}

fn not_found() -> RambuError {
    RambuError::NotFound("Rambu tidak ditemukan".to_string())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Vec<Sign>>> {
    let kategori = query
        .kategori
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(str::parse::<Category>)
        .transpose()?;
    Ok(Json(state.db.list_signs(kategori)?))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Sign>> {
    state.db.get_sign(id)?.map(Json).ok_or_else(not_found)
}

/// `nama`, `kategori` and `gambar` are required; `deskripsi` is optional
pub async fn create(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Sign>)> {
    let mut form = UploadForm::collect(multipart).await?;

    let nama = form.require_text("nama")?.to_string();
    let kategori: Category = form.require_text("kategori")?.parse()?;
    let deskripsi = form.text("deskripsi").map(str::to_string);
    let gambar = form.require_file("gambar")?;

    let gambar_url = state
        .images
        .save(ImageKind::Rambu, &gambar.filename, &gambar.data)
        .await?;

    let new = NewSign {
        nama,
        deskripsi,
        kategori,
        gambar_url: Some(gambar_url.clone()),
    };
    match state.db.insert_sign(&new) {
        Ok(sign) => {
            info!("Created rambu {} '{}'", sign.id, sign.nama);
            Ok((StatusCode::CREATED, Json(sign)))
        }
        Err(e) => {
            discard(&state, &gambar_url).await;
            Err(e)
        }
    }
}

/// Every field is optional; a new `gambar` replaces and deletes the old file
pub async fn update(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    multipart: Multipart,
) -> Result<Json<Sign>> {
    let mut form = UploadForm::collect(multipart).await?;

    let kategori = form
        .text("kategori")
        .map(str::parse::<Category>)
        .transpose()?;

    // validate before touching the disk
    let gambar = form.take_file("gambar");
    if let Some(file) = &gambar {
        state.images.validate_extension(&file.filename)?;
    }
    if state.db.get_sign(id)?.is_none() {
        return Err(not_found());
    }

    let new_image = match &gambar {
        Some(file) => Some(
            state
                .images
                .save(ImageKind::Rambu, &file.filename, &file.data)
                .await?,
        ),
        None => None,
    };

    let update = SignUpdate {
        nama: form.text("nama").map(str::to_string),
        // a blank description clears it
        deskripsi: form.field("deskripsi").map(str::to_string),
        kategori,
        gambar_url: new_image.clone(),
    };

    match state.db.update_sign(id, &update) {
        Ok((sign, replaced)) => {
            if let Some(old) = replaced {
                discard(&state, &old).await;
            }
            Ok(Json(sign))
        }
        Err(e) => {
            if let Some(path) = &new_image {
                discard(&state, path).await;
            }
            Err(e)
        }
    }
}

/// Deletes the sign, its sightings and its image
pub async fn remove(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    let sign = state.db.delete_sign(id)?.ok_or_else(not_found)?;
    if let Some(path) = &sign.gambar_url {
        discard(&state, path).await;
    }
    info!("Deleted rambu {} '{}'", sign.id, sign.nama);
    Ok(Json(json!({ "message": "Rambu berhasil dihapus" })))
}

/// Remove a stored image, logging instead of failing the request
pub(super) async fn discard(state: &AppState, public_path: &str) {
    if let Err(e) = state.images.remove(public_path).await {
        warn!("Failed to delete image {}: {}", public_path, e);
    }
}

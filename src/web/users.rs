// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Account, profile and profile-image handlers

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::extract::{JsonBody, PathId};
use super::rambu::discard;
use super::upload::UploadForm;
use super::AppState;
use crate::auth::{validate_credentials, validate_password, validate_username};
use crate::db::{ProfileUpdate, User};
use crate::storage::ImageKind;
use crate::{RambuError, Result};

#[derive(Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ProfileChange {
    username: Option<String>,
    alamat: Option<String>,
    password: Option<String>,
}

fn user_not_found() -> RambuError {
    RambuError::NotFound("User tidak ditemukan".to_string())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<(StatusCode, Json<Value>)> {
    let username = validate_credentials(&body.username, &body.password)?;
    if state.db.find_user_by_username(&username)?.is_some() {
        return Err(RambuError::UsernameTaken);
    }

    // key stretching is CPU bound
    let hasher = state.hasher;
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&body.password)).await??;

    let user = state.db.create_user(&username, &hash)?;
    info!("Registered user {} '{}'", user.id, user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registrasi berhasil!",
            "username": user.username,
            "user_id": user.id,
        })),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<Json<Value>> {
    let user = state
        .db
        .find_user_by_username(body.username.trim())?
        .ok_or(RambuError::InvalidCredentials)?;

    let hasher = state.hasher;
    let stored = user.password_hash.clone();
    let valid =
        tokio::task::spawn_blocking(move || hasher.verify(&body.password, &stored)).await?;
    if !valid {
        return Err(RambuError::InvalidCredentials);
    }

    Ok(Json(json!({
        "message": "Login sukses!",
        "username": user.username,
        "user_id": user.id,
    })))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.db.list_users()?))
}

/// The user record plus how many sightings they have logged
pub async fn profile(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    let user = state.db.get_user(id)?.ok_or_else(user_not_found)?;
    let total_jelajahi = state.db.count_user_sightings(id)?;
    profile_body(&user, total_jelajahi).map(Json)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    JsonBody(body): JsonBody<ProfileChange>,
) -> Result<Json<Value>> {
    let username = body
        .username
        .as_deref()
        .map(validate_username)
        .transpose()?;

    let password_hash = match body.password {
        Some(password) if !password.is_empty() => {
            validate_password(&password)?;
            let hasher = state.hasher;
            Some(tokio::task::spawn_blocking(move || hasher.hash(&password)).await??)
        }
        _ => None,
    };

    let update = ProfileUpdate {
        username,
        alamat: body.alamat,
        password_hash,
    };
    let user = state.db.update_user_profile(id, &update)?;
    let total_jelajahi = state.db.count_user_sightings(id)?;

    let mut body = profile_body(&user, total_jelajahi)?;
    body["message"] = json!("Profil berhasil diperbarui");
    Ok(Json(body))
}

/// Removes the account, its sightings and its profile image
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    let user = state.db.delete_user(id)?.ok_or_else(user_not_found)?;
    if let Some(path) = &user.foto_profil {
        discard(&state, path).await;
    }
    info!("Deleted user {} '{}'", user.id, user.username);
    Ok(Json(json!({ "message": "Akun berhasil dihapus" })))
}

/// Multipart `file`; the previous image is deleted once the new one is stored
pub async fn upload_profile_image(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    multipart: Multipart,
) -> Result<Json<Value>> {
    if state.db.get_user(id)?.is_none() {
        return Err(user_not_found());
    }

    let mut form = UploadForm::collect(multipart).await?;
    let file = form.require_file("file")?;
    let path = state
        .images
        .save(ImageKind::Profiles, &file.filename, &file.data)
        .await?;

    let previous = match state.db.set_profile_image(id, Some(&path)) {
        Ok(previous) => previous,
        Err(e) => {
            discard(&state, &path).await;
            return Err(e);
        }
    };
    if let Some(old) = previous {
        discard(&state, &old).await;
    }

    Ok(Json(json!({
        "message": "Foto profil berhasil diperbarui",
        "foto_profil": path,
    })))
}

pub async fn delete_profile_image(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    if let Some(old) = state.db.set_profile_image(id, None)? {
        discard(&state, &old).await;
    }
    Ok(Json(json!({ "message": "Foto profil berhasil dihapus" })))
}

fn profile_body(user: &User, total_jelajahi: i64) -> Result<Value> {
    let mut body = serde_json::to_value(user)?;
    body["total_jelajahi"] = json!(total_jelajahi);
    Ok(body)
}

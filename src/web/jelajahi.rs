// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sighting handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::extract::{JsonBody, PathId, QueryParams};
use super::AppState;
use crate::db::{NewSighting, Sighting, SightingUpdate};
use crate::{RambuError, Result};

#[derive(Deserialize)]
pub struct ListQuery {
    user_id: Option<i64>,
}

fn not_found() -> RambuError {
    RambuError::NotFound("Jelajahi tidak ditemukan".to_string())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Vec<Sighting>>> {
    Ok(Json(state.db.list_sightings(query.user_id)?))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Sighting>> {
    state.db.get_sighting(id)?.map(Json).ok_or_else(not_found)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewSighting>,
) -> Result<(StatusCode, Json<Sighting>)> {
    let sighting = state.db.insert_sighting(&body)?;
    info!(
        "User {} logged rambu {} at ({:.5}, {:.5})",
        sighting.user_id, sighting.rambu_id, sighting.latitude, sighting.longitude
    );
    Ok((StatusCode::CREATED, Json(sighting)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
    JsonBody(body): JsonBody<SightingUpdate>,
) -> Result<Json<Sighting>> {
    Ok(Json(state.db.update_sighting(id, &body)?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    PathId(id): PathId,
) -> Result<Json<Value>> {
    if !state.db.delete_sighting(id)? {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Jelajahi berhasil dihapus" })))
}

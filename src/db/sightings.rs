// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use super::{now_timestamp, parse_timestamp, Database, Sighting};
use crate::storage::normalize_public_path;
use crate::{RambuError, Result};

const SIGHTING_SELECT: &str = r#"
    SELECT j.id, j.user_id, j.rambu_id, j.latitude, j.longitude, j.alamat, j.catatan,
           j.created_at, r.nama, r.kategori, r.gambar_url
    FROM jelajahi j JOIN rambu r ON r.id = j.rambu_id"#;

/// A sighting as submitted by the app
#[derive(Debug, Clone, Deserialize)]
pub struct NewSighting {
    pub user_id: i64,
    pub rambu_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub alamat: Option<String>,
    #[serde(default)]
    pub catatan: Option<String>,
}

/// Partial sighting update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SightingUpdate {
    pub rambu_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub alamat: Option<String>,
    pub catatan: Option<String>,
}

/// Latitude must be within [-90, 90] and longitude within [-180, 180]
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(RambuError::InvalidCoordinates(format!(
            "latitude {} harus di antara -90 dan 90",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(RambuError::InvalidCoordinates(format!(
            "longitude {} harus di antara -180 dan 180",
            longitude
        )));
    }
    Ok(())
}

fn sighting_from_row(row: &Row<'_>) -> rusqlite::Result<Sighting> {
    Ok(Sighting {
        id: row.get(0)?,
        user_id: row.get(1)?,
        rambu_id: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        alamat: row.get(5)?,
        catatan: row.get(6)?,
        created_at: parse_timestamp(row.get(7)?),
        rambu_nama: row.get(8)?,
        kategori: row.get(9)?,
        gambar_url: row.get::<_, Option<String>>(10)?.map(normalize_public_path),
    })
}

fn ensure_exists(conn: &Connection, table: &str, id: i64, message: &str) -> Result<()> {
    let found: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
        params![id],
        |row| row.get(0),
    )?;
    if found {
        Ok(())
    } else {
        Err(RambuError::NotFound(message.to_string()))
    }
}

fn select_sighting(conn: &Connection, id: i64) -> Result<Option<Sighting>> {
    conn.query_row(
        &format!("{SIGHTING_SELECT} WHERE j.id = ?1"),
        params![id],
        sighting_from_row,
    )
    .optional()
    .map_err(Into::into)
}

impl Database {
    /// Log a sighting after checking the coordinates and both references
    pub fn insert_sighting(&self, sighting: &NewSighting) -> Result<Sighting> {
        validate_coordinates(sighting.latitude, sighting.longitude)?;

        let conn = self.lock_conn()?;
        ensure_exists(&conn, "users", sighting.user_id, "User tidak ditemukan")?;
        ensure_exists(&conn, "rambu", sighting.rambu_id, "Rambu tidak ditemukan")?;

        conn.execute(
            r#"INSERT INTO jelajahi (user_id, rambu_id, latitude, longitude, alamat, catatan, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                sighting.user_id,
                sighting.rambu_id,
                sighting.latitude,
                sighting.longitude,
                sighting.alamat,
                sighting.catatan,
                now_timestamp(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        select_sighting(&conn, id)?
            .ok_or_else(|| RambuError::NotFound("Jelajahi tidak ditemukan".to_string()))
    }

    pub fn get_sighting(&self, id: i64) -> Result<Option<Sighting>> {
        let conn = self.lock_conn()?;
        select_sighting(&conn, id)
    }

    /// Sightings newest first, optionally for a single user
    pub fn list_sightings(&self, user_id: Option<i64>) -> Result<Vec<Sighting>> {
        let conn = self.lock_conn()?;
        let sightings = match user_id {
            Some(user_id) => {
                let mut stmt = conn.prepare(&format!(
                    "{SIGHTING_SELECT} WHERE j.user_id = ?1 ORDER BY j.created_at DESC, j.id DESC"
                ))?;
                let rows = stmt.query_map(params![user_id], sighting_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{SIGHTING_SELECT} ORDER BY j.created_at DESC, j.id DESC"
                ))?;
                let rows = stmt.query_map([], sighting_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(sightings)
    }

    /// Apply a partial update; coordinates are validated as a pair
    pub fn update_sighting(&self, id: i64, update: &SightingUpdate) -> Result<Sighting> {
        let conn = self.lock_conn()?;
        let mut current = select_sighting(&conn, id)?
            .ok_or_else(|| RambuError::NotFound("Jelajahi tidak ditemukan".to_string()))?;

        if let Some(rambu_id) = update.rambu_id {
            ensure_exists(&conn, "rambu", rambu_id, "Rambu tidak ditemukan")?;
            current.rambu_id = rambu_id;
        }
        if let Some(latitude) = update.latitude {
            current.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            current.longitude = longitude;
        }
        validate_coordinates(current.latitude, current.longitude)?;
        if let Some(alamat) = &update.alamat {
            current.alamat = Some(alamat.clone());
        }
        if let Some(catatan) = &update.catatan {
            current.catatan = Some(catatan.clone());
        }

        conn.execute(
            r#"UPDATE jelajahi SET rambu_id = ?1, latitude = ?2, longitude = ?3, alamat = ?4, catatan = ?5
               WHERE id = ?6"#,
            params![
                current.rambu_id,
                current.latitude,
                current.longitude,
                current.alamat,
                current.catatan,
                id,
            ],
        )?;

        // re-read so the joined sign fields follow a changed rambu_id
        select_sighting(&conn, id)?
            .ok_or_else(|| RambuError::NotFound("Jelajahi tidak ditemukan".to_string()))
    }

    /// Returns false when no such sighting exists
    pub fn delete_sighting(&self, id: i64) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM jelajahi WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

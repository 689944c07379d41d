// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use rusqlite::{params, OptionalExtension, Row};

use super::{Category, Database, Sign};
use crate::storage::normalize_public_path;
use crate::{RambuError, Result};

const SIGN_COLUMNS: &str = "id, nama, gambar_url, deskripsi, kategori";

/// A sign about to be inserted
#[derive(Debug, Clone)]
pub struct NewSign {
    pub nama: String,
    pub deskripsi: Option<String>,
    pub kategori: Category,
    pub gambar_url: Option<String>,
}

/// Partial sign update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct SignUpdate {
    pub nama: Option<String>,
    pub deskripsi: Option<String>,
    pub kategori: Option<Category>,
    pub gambar_url: Option<String>,
}

fn sign_from_row(row: &Row<'_>) -> rusqlite::Result<Sign> {
    Ok(Sign {
        id: row.get(0)?,
        nama: row.get(1)?,
        gambar_url: row.get::<_, Option<String>>(2)?.map(normalize_public_path),
        deskripsi: row.get(3)?,
        kategori: row.get(4)?,
    })
}

impl Database {
    pub fn insert_sign(&self, sign: &NewSign) -> Result<Sign> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO rambu (nama, gambar_url, deskripsi, kategori) VALUES (?1, ?2, ?3, ?4)",
            params![sign.nama, sign.gambar_url, sign.deskripsi, sign.kategori],
        )?;

        Ok(Sign {
            id: conn.last_insert_rowid(),
            nama: sign.nama.clone(),
            gambar_url: sign.gambar_url.clone().map(normalize_public_path),
            deskripsi: sign.deskripsi.clone(),
            kategori: sign.kategori,
        })
    }

    pub fn get_sign(&self, id: i64) -> Result<Option<Sign>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {SIGN_COLUMNS} FROM rambu WHERE id = ?1"),
            params![id],
            sign_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All signs, optionally restricted to one category
    pub fn list_signs(&self, kategori: Option<Category>) -> Result<Vec<Sign>> {
        let conn = self.lock_conn()?;
        let signs = match kategori {
            Some(kategori) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SIGN_COLUMNS} FROM rambu WHERE LOWER(kategori) = ?1 ORDER BY id"
                ))?;
                let rows = stmt.query_map(params![kategori.as_str()], sign_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SIGN_COLUMNS} FROM rambu ORDER BY id"))?;
                let rows = stmt.query_map([], sign_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(signs)
    }

    /// Apply a partial update. Returns the updated sign and, when the image
    /// was replaced, the previous image path so the caller can delete it.
    pub fn update_sign(&self, id: i64, update: &SignUpdate) -> Result<(Sign, Option<String>)> {
        let conn = self.lock_conn()?;
        let mut sign = conn
            .query_row(
                &format!("SELECT {SIGN_COLUMNS} FROM rambu WHERE id = ?1"),
                params![id],
                sign_from_row,
            )
            .optional()?
            .ok_or_else(|| RambuError::NotFound("Rambu tidak ditemukan".to_string()))?;

        if let Some(nama) = &update.nama {
            sign.nama = nama.clone();
        }
        if let Some(deskripsi) = &update.deskripsi {
            sign.deskripsi = Some(deskripsi.clone());
        }
        if let Some(kategori) = update.kategori {
            sign.kategori = kategori;
        }
        let mut replaced = None;
        if let Some(gambar_url) = &update.gambar_url {
            replaced = sign.gambar_url.replace(gambar_url.clone());
        }

        conn.execute(
            "UPDATE rambu SET nama = ?1, gambar_url = ?2, deskripsi = ?3, kategori = ?4 WHERE id = ?5",
            params![sign.nama, sign.gambar_url, sign.deskripsi, sign.kategori, id],
        )?;
        Ok((sign, replaced))
    }

    /// Delete a sign together with every sighting that references it
    pub fn delete_sign(&self, id: i64) -> Result<Option<Sign>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let sign = tx
            .query_row(
                &format!("SELECT {SIGN_COLUMNS} FROM rambu WHERE id = ?1"),
                params![id],
                sign_from_row,
            )
            .optional()?;

        if sign.is_some() {
            let sightings = tx.execute("DELETE FROM jelajahi WHERE rambu_id = ?1", params![id])?;
            tx.execute("DELETE FROM rambu WHERE id = ?1", params![id])?;
            tracing::debug!("Deleted rambu {} and {} sightings", id, sightings);
        }
        tx.commit()?;
        Ok(sign)
    }

    /// Exact, case-insensitive name lookup
    pub fn find_sign_by_name(&self, nama: &str) -> Result<Option<Sign>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!(
                "SELECT {SIGN_COLUMNS} FROM rambu WHERE LOWER(nama) = LOWER(?1) ORDER BY id LIMIT 1"
            ),
            params![nama.trim()],
            sign_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Signs whose name contains `fragment` (case-insensitive), shortest name first
    pub fn search_signs(&self, fragment: &str, limit: usize) -> Result<Vec<Sign>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock_conn()?;
        let pattern = format!("%{}%", escape_like(fragment));
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SIGN_COLUMNS} FROM rambu
               WHERE nama LIKE ?1 ESCAPE '\'
               ORDER BY LENGTH(nama), id LIMIT ?2"#
        ))?;
        let signs = stmt
            .query_map(params![pattern, limit as i64], sign_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(signs)
    }

    /// Correct the description and category of every sign with this exact name.
    /// Returns the number of rows touched.
    pub fn update_sign_by_name(
        &self,
        nama: &str,
        deskripsi: Option<&str>,
        kategori: Option<Category>,
    ) -> Result<usize> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"UPDATE rambu
               SET deskripsi = COALESCE(?1, deskripsi), kategori = COALESCE(?2, kategori)
               WHERE nama = ?3"#,
            params![deskripsi, kategori, nama],
        )?;
        Ok(changed)
    }

    /// Delete the first sign with this exact name, with its sightings
    pub fn delete_sign_by_name(&self, nama: &str) -> Result<Option<Sign>> {
        let id: Option<i64> = {
            let conn = self.lock_conn()?;
            conn.query_row(
                "SELECT id FROM rambu WHERE nama = ?1 ORDER BY id LIMIT 1",
                params![nama],
                |row| row.get(0),
            )
            .optional()?
        };

        match id {
            Some(id) => self.delete_sign(id),
            None => Ok(None),
        }
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

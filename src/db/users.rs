// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, parse_timestamp, Database, User};
use crate::{RambuError, Result};

const USER_COLUMNS: &str = "id, username, password_hash, alamat, foto_profil, created_at";

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub alamat: Option<String>,
    pub password_hash: Option<String>,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        alamat: row.get(3)?,
        foto_profil: row.get(4)?,
        created_at: parse_timestamp(row.get(5)?),
    })
}

impl Database {
    /// Register a new account. Usernames are unique.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let conn = self.lock_conn()?;

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(RambuError::UsernameTaken);
        }

        let created_at = now_timestamp();
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        )?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .map_err(Into::into)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Number of sightings a user has logged
    pub fn count_user_sightings(&self, user_id: i64) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM jelajahi WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    /// Apply a partial profile update, returning the updated user
    pub fn update_user_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User> {
        let conn = self.lock_conn()?;

        let mut user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| RambuError::NotFound("User tidak ditemukan".to_string()))?;

        if let Some(username) = &update.username {
            if username != &user.username {
                let taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
                    params![username, id],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(RambuError::UsernameTaken);
                }
                user.username = username.clone();
            }
        }
        if let Some(alamat) = &update.alamat {
            // an empty address clears it
            user.alamat = Some(alamat.trim().to_string()).filter(|a| !a.is_empty());
        }
        if let Some(hash) = &update.password_hash {
            user.password_hash = hash.clone();
        }

        conn.execute(
            "UPDATE users SET username = ?1, alamat = ?2, password_hash = ?3 WHERE id = ?4",
            params![user.username, user.alamat, user.password_hash, id],
        )?;
        Ok(user)
    }

    /// Point the user at a new profile image, returning the previous one
    pub fn set_profile_image(&self, id: i64, path: Option<&str>) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        let previous: Option<String> = conn
            .query_row(
                "SELECT foto_profil FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RambuError::NotFound("User tidak ditemukan".to_string()))?;

        conn.execute(
            "UPDATE users SET foto_profil = ?1 WHERE id = ?2",
            params![path, id],
        )?;
        Ok(previous)
    }

    /// Delete an account and its sightings. Returns the removed user.
    pub fn delete_user(&self, id: i64) -> Result<Option<User>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let user = tx
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;

        if user.is_some() {
            tx.execute("DELETE FROM jelajahi WHERE user_id = ?1", params![id])?;
            tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(user)
    }

    /// Remove every account except `keep_id`, with their sightings.
    /// Returns the number of accounts removed.
    pub fn prune_users_except(&self, keep_id: i64) -> Result<usize> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM jelajahi WHERE user_id != ?1", params![keep_id])?;
        let removed = tx.execute("DELETE FROM users WHERE id != ?1", params![keep_id])?;
        tx.commit()?;
        Ok(removed)
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for users, signs (rambu) and sightings (jelajahi)

mod sightings;
mod signs;
mod users;

pub use sightings::{validate_coordinates, NewSighting, SightingUpdate};
pub use signs::{NewSign, SignUpdate};
pub use users::ProfileUpdate;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use crate::{RambuError, Result};

/// Database manager for RambuID (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub alamat: Option<String>,
    pub foto_profil: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sign category as used by the mobile app
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Larangan,
    Peringatan,
    Petunjuk,
    Perintah,
}

/// A catalogued traffic sign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sign {
    pub id: i64,
    pub nama: String,
    pub gambar_url: Option<String>,
    pub deskripsi: Option<String>,
    pub kategori: Category,
}

/// A geotagged sighting of a sign, joined with the sign it references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sighting {
    pub id: i64,
    pub user_id: i64,
    pub rambu_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub alamat: Option<String>,
    pub catatan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub rambu_nama: String,
    pub kategori: Category,
    pub gambar_url: Option<String>,
}

/// Catalogue statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_users: i64,
    pub total_rambu: i64,
    pub total_jelajahi: i64,
    pub rambu_per_kategori: BTreeMap<String, i64>,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Larangan,
        Category::Peringatan,
        Category::Petunjuk,
        Category::Perintah,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Larangan => "larangan",
            Category::Peringatan => "peringatan",
            Category::Petunjuk => "petunjuk",
            Category::Perintah => "perintah",
        }
    }

    /// Comma separated list for error messages
    pub fn valid_values() -> String {
        Self::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RambuError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| RambuError::InvalidCategory(Self::valid_values()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: RambuError| FromSqlError::Other(Box::new(e)))
    }
}

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RambuError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema and bring older databases up to date
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.busy_timeout(Duration::from_secs(20))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                alamat TEXT,
                foto_profil TEXT,
                created_at TEXT
            );

            CREATE TABLE IF NOT EXISTS rambu (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nama TEXT NOT NULL,
                gambar_url TEXT,
                deskripsi TEXT,
                kategori TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jelajahi (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                rambu_id INTEGER NOT NULL REFERENCES rambu(id),
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                alamat TEXT,
                catatan TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rambu_nama ON rambu(nama);
            CREATE INDEX IF NOT EXISTS idx_jelajahi_user ON jelajahi(user_id);
            CREATE INDEX IF NOT EXISTS idx_jelajahi_rambu ON jelajahi(rambu_id);
        "#)?;

        migrate_users(&conn)?;
        Ok(())
    }

    /// Counts shown on the admin dashboard
    pub fn stats(&self) -> Result<Stats> {
        let conn = self.lock_conn()?;
        let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let total_rambu: i64 = conn.query_row("SELECT COUNT(*) FROM rambu", [], |row| row.get(0))?;
        let total_jelajahi: i64 =
            conn.query_row("SELECT COUNT(*) FROM jelajahi", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT LOWER(kategori), COUNT(*) FROM rambu GROUP BY LOWER(kategori)",
        )?;
        let rambu_per_kategori = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(Stats {
            total_users,
            total_rambu,
            total_jelajahi,
            rambu_per_kategori,
        })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

/// Add columns that older databases were created without
fn migrate_users(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for column in ["alamat", "foto_profil", "created_at"] {
        if !columns.iter().any(|c| c == column) {
            info!("Adding column '{}' to users table", column);
            conn.execute(&format!("ALTER TABLE users ADD COLUMN {} TEXT", column), [])?;
        }
    }

    conn.execute(
        "UPDATE users SET created_at = ?1 WHERE created_at IS NULL",
        params![now_timestamp()],
    )?;
    Ok(())
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

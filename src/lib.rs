// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! RambuID: backend for the Indonesian traffic-sign learning app
//!
//! Sign catalogue, geotagged sightings, accounts with profile images,
//! and photo-based sign recognition backed by a local model server.

pub mod auth;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod storage;
pub mod web;

pub use config::AppConfig;
pub use error::{RambuError, Result};

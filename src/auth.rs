// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Password hashing and credential checks

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use pbkdf2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use sha2::Sha256;

use crate::{RambuError, Result};

const SALT_LEN: usize = 16;
const MIN_USERNAME: usize = 3;
const MAX_USERNAME: usize = 50;
const MIN_PASSWORD: usize = 6;
const SCHEME: &str = "pbkdf2-sha256";

/// PBKDF2-SHA256 hasher producing PHC strings (`$pbkdf2-sha256$i=...`)
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    rounds: u32,
}

impl PasswordHasher {
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| RambuError::PasswordHash(e.to_string()))?;

        let params = Params {
            rounds: self.rounds,
            output_length: 32,
        };
        let hash = Pbkdf2
            .hash_password_customized(password.as_bytes(), None, None, params, &salt)
            .map_err(|e| RambuError::PasswordHash(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// Iteration count comes from the stored hash, so changing `rounds`
    /// never invalidates existing accounts. Both PHC strings and the passlib
    /// layout (`$pbkdf2-sha256$<rounds>$<salt>$<hash>`) are accepted.
    /// Malformed hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        if let Some(legacy) = PasslibHash::parse(stored) {
            return legacy.verify(password);
        }

        match PasswordHash::new(stored) {
            Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }
}

/// Hash in passlib's layout: positional rounds and `.` in place of `+`
struct PasslibHash {
    rounds: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl PasslibHash {
    fn parse(stored: &str) -> Option<Self> {
        let mut parts = stored.split('$');
        if parts.next() != Some("") || parts.next() != Some(SCHEME) {
            return None;
        }
        let rounds = parts.next()?.parse::<u32>().ok()?;
        let salt = decode_ab64(parts.next()?)?;
        let hash = decode_ab64(parts.next()?)?;
        if parts.next().is_some() || rounds == 0 || hash.is_empty() {
            return None;
        }
        Some(Self { rounds, salt, hash })
    }

    fn verify(&self, password: &str) -> bool {
        let mut derived = vec![0u8; self.hash.len()];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &self.salt, self.rounds, &mut derived);
        derived
            .iter()
            .zip(&self.hash)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn decode_ab64(value: &str) -> Option<Vec<u8>> {
    STANDARD_NO_PAD.decode(value.replace('.', "+")).ok()
}

/// Normalize and validate registration credentials, returning the trimmed username
pub fn validate_credentials(username: &str, password: &str) -> Result<String> {
    let username = validate_username(username)?;
    validate_password(password)?;
    Ok(username)
}

/// Trimmed username of 3-50 characters without whitespace
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    let len = username.chars().count();

    if !(MIN_USERNAME..=MAX_USERNAME).contains(&len) {
        return Err(RambuError::BadRequest(format!(
            "Username harus {}-{} karakter",
            MIN_USERNAME, MAX_USERNAME
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(RambuError::BadRequest(
            "Username tidak boleh mengandung spasi".to_string(),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD {
        return Err(RambuError::BadRequest(format!(
            "Password minimal {} karakter",
            MIN_PASSWORD
        )));
    }
    Ok(())
}

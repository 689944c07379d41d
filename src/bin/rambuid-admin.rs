// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! RambuID Admin Utility
//!
//! Offline account tooling that works directly on the database file.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rambuid::auth::{validate_password, PasswordHasher};
use rambuid::config::AppConfig;
use rambuid::db::Database;

#[derive(Parser, Debug)]
#[command(name = "rambuid-admin")]
#[command(version)]
#[command(about = "Offline account administration for RambuID")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: AdminCommand,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Print a password hash in the format stored in `users.password_hash`
    HashPassword {
        password: String,
    },

    /// List registered accounts
    ListUsers {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("loading {:?}", args.config))?;

    match args.command {
        AdminCommand::HashPassword { password } => {
            if let Err(e) = validate_password(&password) {
                bail!("{}", e);
            }
            let hasher = PasswordHasher::new(config.security.pbkdf2_rounds);
            println!("{}", hasher.hash(&password)?);
        }
        AdminCommand::ListUsers { json } => {
            let db = Database::open(&config.database.path)
                .with_context(|| format!("opening database {}", config.database.path))?;
            let users = db.list_users()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            if users.is_empty() {
                println!("No users registered.");
                return Ok(());
            }

            println!("Users ({}):", users.len());
            println!("{:-<72}", "");
            for user in &users {
                let sightings = db.count_user_sightings(user.id)?;
                println!(
                    "{:4}  {:<24} {:>4} jelajahi  since {}",
                    user.id,
                    user.username,
                    sightings,
                    user.created_at.format("%Y-%m-%d")
                );
            }
        }
    }

    Ok(())
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! RambuID: traffic-sign learning backend
//!
//! Runs the HTTP API and offers maintenance commands for the catalogue.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rambuid::config::AppConfig;
use rambuid::db::{Category, Database};
use rambuid::detect::{build_detector, prepare_image, recognize};
use rambuid::storage::ImageStore;
use rambuid::{RambuError, Result};

/// RambuID CLI - traffic sign catalogue and recognition backend
#[derive(Parser, Debug)]
#[command(name = "rambuid")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Backend for the RambuID traffic sign app", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file
        #[arg(long)]
        db: Option<String>,
    },

    /// Create config.json, the database and the upload directories
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },

    /// Recognize the sign in a photo using the configured detector
    Detect {
        /// Image file
        image: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Show database statistics
    Stats,

    /// Vacuum database (reclaim space)
    Vacuum,

    /// Correct description and/or category of signs with this exact name
    UpdateSign {
        /// Exact sign name
        nama: String,

        /// New description
        #[arg(short, long)]
        deskripsi: Option<String>,

        /// New category (larangan, peringatan, petunjuk, perintah)
        #[arg(short, long)]
        kategori: Option<String>,
    },

    /// Delete a sign by exact name, with its sightings and image
    DeleteSign {
        /// Exact sign name
        nama: String,
    },

    /// Delete every account except one
    PruneUsers {
        /// Username to keep
        #[arg(long)]
        keep: String,

        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("RambuID v{}", env!("CARGO_PKG_VERSION"));
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port, db }) => run_serve(config, host, port, db).await,
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Db { action }) => run_db_command(config, action).await,
        Some(Commands::Detect { image }) => run_detect(config, &image).await,
        None => run_serve(config, None, None, None).await,
    }
}

async fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    db: Option<String>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(db) = db {
        config.database.path = db;
    }
    config.validate()?;

    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);
    info!(
        "Detector: {:?} at {} (connects on first request)",
        config.detector.backend, config.detector.url
    );

    rambuid::web::start_server(config, db).await
}

fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(RambuError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }
    std::fs::create_dir_all(&target)?;

    let mut config = AppConfig::default();
    config.database.path = target.join("rambuid.db").to_string_lossy().to_string();
    config.storage.static_dir = target.join("static").to_string_lossy().to_string();
    config.save(&config_path)?;

    ImageStore::new(&config.storage.static_dir, &config.uploads.allowed_extensions)?;
    Database::open(&config.database.path)?;

    println!("RambuID initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - rambuid.db");
    println!("  - static/images/{{rambu,uploads,profiles}}/");
    println!("\nNext steps:");
    println!("  1. Start the detector service at {}", config.detector.url);
    println!("  2. Start the API: rambuid serve");

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Listen: {}", config.bind_addr());
            println!("  Database: {}", config.database.path);
            println!("  Static dir: {}", config.storage.static_dir);
            println!(
                "  Detector: {:?} {} (min confidence {:.2})",
                config.detector.backend, config.detector.url, config.detector.min_confidence
            );
        }
    }
    Ok(())
}

async fn run_db_command(config: AppConfig, action: DbCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        DbCommands::Stats => {
            let stats = db.stats()?;
            println!("Database Statistics:");
            println!("  Users: {}", stats.total_users);
            println!("  Rambu: {}", stats.total_rambu);
            println!("  Jelajahi: {}", stats.total_jelajahi);
            for (kategori, count) in &stats.rambu_per_kategori {
                println!("    {}: {}", kategori, count);
            }
        }
        DbCommands::Vacuum => {
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
        DbCommands::UpdateSign { nama, deskripsi, kategori } => {
            let kategori = kategori.as_deref().map(str::parse::<Category>).transpose()?;
            if deskripsi.is_none() && kategori.is_none() {
                return Err(RambuError::BadRequest(
                    "Nothing to update: pass --deskripsi and/or --kategori".to_string(),
                ));
            }
            let changed = db.update_sign_by_name(&nama, deskripsi.as_deref(), kategori)?;
            if changed == 0 {
                warn!("No sign named '{}'", nama);
            }
            println!("Updated {} sign(s) named '{}'", changed, nama);
        }
        DbCommands::DeleteSign { nama } => match db.delete_sign_by_name(&nama)? {
            Some(sign) => {
                if let Some(path) = &sign.gambar_url {
                    let images =
                        ImageStore::new(&config.storage.static_dir, &config.uploads.allowed_extensions)?;
                    images.remove(path).await?;
                }
                println!("Deleted sign {} '{}'", sign.id, sign.nama);
            }
            None => println!("No sign named '{}'", nama),
        },
        DbCommands::PruneUsers { keep, force } => {
            let user = db
                .find_user_by_username(&keep)?
                .ok_or_else(|| RambuError::NotFound(format!("No user named '{}'", keep)))?;
            if !force {
                eprintln!("Use --force to delete every account except '{}'", keep);
                return Ok(());
            }
            let removed = db.prune_users_except(user.id)?;
            println!("Removed {} account(s), kept '{}'", removed, user.username);
        }
    }

    Ok(())
}

async fn run_detect(config: AppConfig, image: &Path) -> Result<()> {
    let data = tokio::fs::read(image).await?;
    let prepared = prepare_image(&data, config.detector.input_size)?;

    let detector = build_detector(&config.detector)?;
    detector.health_check().await?;

    let db = Database::open(&config.database.path)?;
    let outcome = recognize(&db, detector.as_ref(), &prepared, config.detector.min_confidence).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

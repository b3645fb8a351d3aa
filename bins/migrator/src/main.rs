//! SQL migration runner for Sprout.
//!
//! Usage:
//!   migrator up                   - Apply all pending migrations
//!   migrator down [--steps N]     - Roll back the N highest applied migrations (default 1)
//!   migrator status               - Show applied and pending migrations
//!   migrator create <description> - Write a new, empty migration file

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use sprout_db::{DirSource, MigrationStatus, Migrator};
use sprout_shared::{AppConfig, telemetry};

#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Apply and roll back SQL migrations")]
struct Cli {
    /// Migrations directory (overrides `paths.migrations_dir`)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,

    /// Roll back applied migrations, highest version first
    Down {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        steps: i64,
    },

    /// Show applied and pending migrations
    Status,

    /// Create a new migration file
    Create {
        /// Short description, used in the file name
        description: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    let dir = cli.dir.unwrap_or_else(|| config.paths.migrations_dir.clone());

    match cli.command {
        Command::Create { description } => {
            let path =
                sprout_db::migration::create_migration(&dir, &description, chrono::Utc::now())?;
            println!("Created migration: {}", path.display());
        }
        Command::Up => {
            let report = load_migrator(&config, &dir).await?.migrate().await?;
            info!(
                applied = report.applied.len(),
                skipped = report.skipped,
                "Migrations complete"
            );
        }
        Command::Down { steps } => {
            let report = load_migrator(&config, &dir).await?.rollback(steps).await?;
            info!(rolled_back = report.rolled_back.len(), "Rollback complete");
        }
        Command::Status => print_status(&load_migrator(&config, &dir).await?).await?,
    }

    Ok(())
}

/// Connects to the configured database and loads the migrations in `dir`.
async fn load_migrator(config: &AppConfig, dir: &Path) -> anyhow::Result<Migrator> {
    let url = config.database.connection_url()?;
    let db = sprout_db::connect(
        &url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let mut migrator = Migrator::new(db, DirSource::new(dir));
    migrator
        .load_migrations()
        .with_context(|| format!("Failed to load migrations from {}", dir.display()))?;
    Ok(migrator)
}

async fn print_status(migrator: &Migrator) -> anyhow::Result<()> {
    let states = migrator.status().await?;
    if states.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    println!("{:<16} {:<10} {:<26} NAME", "VERSION", "STATE", "APPLIED AT");
    for state in states {
        let (label, applied_at) = match &state.status {
            MigrationStatus::Pending => ("pending", None),
            MigrationStatus::Applied { applied_at } => ("applied", applied_at.as_ref()),
            MigrationStatus::Orphaned { applied_at } => ("orphaned", applied_at.as_ref()),
        };
        let applied_at = applied_at.map_or_else(
            || "-".to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        );
        println!(
            "{:<16} {:<10} {:<26} {}",
            state.version, label, applied_at, state.name
        );
    }
    Ok(())
}

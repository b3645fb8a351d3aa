//! SQL seed runner for Sprout development databases.
//!
//! Executes every `.sql` file in the seeds directory in filename order.
//! Seeds run on every invocation, so they must be idempotent
//! (e.g. `INSERT ... ON CONFLICT DO NOTHING`).
//!
//! Usage: seeder [--dir <path>]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use sprout_db::{DirSource, Seeder};
use sprout_shared::{AppConfig, telemetry};

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Load seed data into the database")]
struct Cli {
    /// Seeds directory (overrides `paths.seeds_dir`)
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    let dir = cli.dir.unwrap_or_else(|| config.paths.seeds_dir.clone());
    let url = config.database.connection_url()?;

    let db = sprout_db::connect(
        &url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let mut seeder = Seeder::new(db, DirSource::new(&dir));
    seeder
        .load_seeds()
        .with_context(|| format!("Failed to load seeds from {}", dir.display()))?;

    let report = seeder.seed().await?;
    info!(executed = report.executed.len(), "Seeding complete");

    Ok(())
}

//! Schema evolution engine for Sprout.
//!
//! This crate provides:
//! - SQL sources (a directory on disk, or files compiled into the binary)
//! - Versioned migrations with an up and a down block, tracked in a ledger table
//! - Seed scripts executed in filename order on every run
//!
//! # Usage
//!
//! ```ignore
//! use sprout_db::{DirSource, Migrator};
//!
//! let db = sprout_db::connect(&url, 5, 1).await?;
//! let mut migrator = Migrator::new(db, DirSource::new("migrations"));
//! migrator.load_migrations()?;
//! migrator.migrate().await?;
//! ```

pub mod error;
pub mod migration;
pub mod seed;
pub mod source;
mod txn;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, SchemaError, SchemaResult, TxStage};
pub use migration::{
    MigrateReport, MigrationDefinition, MigrationState, MigrationStatus, Migrator, RollbackReport,
};
pub use seed::{SeedDefinition, SeedReport, Seeder};
pub use source::{DirSource, MemorySource, SourceFile, SqlSource};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}

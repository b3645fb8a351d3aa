//! Error types for the schema evolution engine.

use std::fmt;
use std::io;

use sea_orm::DbErr;
use thiserror::Error;

/// Result type alias using `SchemaError`.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Step of a per-item transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    /// Opening the transaction.
    Begin,
    /// Executing the item's SQL.
    Execute,
    /// Writing or deleting the ledger row.
    Record,
    /// Committing the transaction.
    Commit,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Begin => "starting transaction",
            Self::Execute => "executing statements",
            Self::Record => "updating migration ledger",
            Self::Commit => "committing transaction",
        })
    }
}

/// Broad family of a [`SchemaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unreadable source files.
    Load,
    /// Failure talking to the database.
    Transaction,
    /// A recorded migration has no matching definition.
    NotFound,
}

/// Errors raised while loading, applying, reverting or seeding.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The migration filename does not start with `<digits>_`.
    #[error("invalid version format in migration file {file}: {reason}")]
    InvalidVersionFormat {
        /// Offending filename.
        file: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The migration body does not contain exactly one `-- Down` marker.
    #[error(
        "invalid migration format in {file}: expected exactly one `-- Down` marker, found {occurrences}"
    )]
    InvalidMigrationFormat {
        /// Offending filename.
        file: String,
        /// How many markers were found.
        occurrences: usize,
    },

    /// Two migration files share a version number.
    #[error("duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        /// Shared version.
        version: i64,
        /// First file carrying it.
        first: String,
        /// Second file carrying it.
        second: String,
    },

    /// The source listing itself could not be read.
    #[error("failed to read {what} source: {source}")]
    SourceUnavailable {
        /// `migrations` or `seeds`.
        what: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A single source file could not be read.
    #[error("failed to read file {file}: {source}")]
    Read {
        /// Offending filename.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// One or more seed files could not be read.
    #[error("errors occurred while loading seeds: {}", format_failures(.failures))]
    SeedLoad {
        /// Every file that failed, with its error.
        failures: Vec<(String, io::Error)>,
    },

    /// A new migration file could not be written.
    #[error("failed to create migration: {0}")]
    Scaffold(String),

    /// Creating or querying the ledger table failed.
    #[error("migration ledger error: {0}")]
    Ledger(#[from] DbErr),

    /// Applying a migration failed.
    #[error("failed to apply migration {name}: error {stage}: {source}")]
    Apply {
        /// Migration name.
        name: String,
        /// Failed step.
        stage: TxStage,
        /// Database error.
        #[source]
        source: DbErr,
    },

    /// Rolling back a migration failed.
    #[error("failed to rollback migration {name}: error {stage}: {source}")]
    Revert {
        /// Migration name.
        name: String,
        /// Failed step.
        stage: TxStage,
        /// Database error.
        #[source]
        source: DbErr,
    },

    /// Executing a seed failed.
    #[error("failed to execute seed {name}: error {stage}: {source}")]
    Seed {
        /// Seed name.
        name: String,
        /// Failed step.
        stage: TxStage,
        /// Database error.
        #[source]
        source: DbErr,
    },

    /// A ledger row refers to a version that is not loaded.
    #[error("migration with version {version} not found")]
    MigrationNotFound {
        /// Recorded version.
        version: i64,
    },
}

impl SchemaError {
    /// Returns the error family.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidVersionFormat { .. }
            | Self::InvalidMigrationFormat { .. }
            | Self::DuplicateVersion { .. }
            | Self::SourceUnavailable { .. }
            | Self::Read { .. }
            | Self::SeedLoad { .. }
            | Self::Scaffold(_) => ErrorKind::Load,
            Self::Ledger(_) | Self::Apply { .. } | Self::Revert { .. } | Self::Seed { .. } => {
                ErrorKind::Transaction
            }
            Self::MigrationNotFound { .. } => ErrorKind::NotFound,
        }
    }
}

fn format_failures(failures: &[(String, io::Error)]) -> String {
    failures
        .iter()
        .map(|(file, err)| format!("{file}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

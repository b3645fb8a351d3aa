//! SQL migrations.
//!
//! Migrations are plain `.sql` files named `<version>_<description>.sql`,
//! each split into an up and a down block by a `-- Down` line. Applied
//! versions are tracked in the `migrations` ledger table.

pub mod definition;
pub mod ledger;
pub mod migrator;
pub mod scaffold;

pub use definition::{DOWN_MARKER, MigrationDefinition, load_migrations};
pub use migrator::{MigrateReport, MigrationState, MigrationStatus, Migrator, RollbackReport};
pub use scaffold::create_migration;

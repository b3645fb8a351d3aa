//! Applies and rolls back SQL migrations against the ledger.
//!
//! Each migration runs in its own transaction together with its ledger
//! write, so a version is recorded if and only if its SQL committed. A failed
//! item aborts the run; items committed earlier in the same run stay applied.

use std::collections::HashSet;

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{debug, error, info};

use super::definition::{MigrationDefinition, load_migrations};
use super::ledger;
use crate::error::{SchemaError, SchemaResult, TxStage};
use crate::source::SqlSource;
use crate::txn::abort;

/// Outcome of [`Migrator::migrate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateReport {
    /// Names of the migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Number of loaded migrations that were already applied.
    pub skipped: usize,
}

/// Outcome of [`Migrator::rollback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Names of the migrations rolled back by this run, in order.
    pub rolled_back: Vec<String>,
}

/// Whether a migration is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Loaded but not in the ledger.
    Pending,
    /// Loaded and recorded in the ledger.
    Applied {
        /// When the ledger row was written.
        applied_at: Option<DateTimeWithTimeZone>,
    },
    /// Recorded in the ledger but no file defines it.
    Orphaned {
        /// When the ledger row was written.
        applied_at: Option<DateTimeWithTimeZone>,
    },
}

/// One line of [`Migrator::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    /// Migration version.
    pub version: i64,
    /// Migration name (file name, or the recorded name for orphans).
    pub name: String,
    /// Applied state.
    pub status: MigrationStatus,
}

/// Runs migrations loaded from a [`SqlSource`].
///
/// A migrator is meant to serve one command invocation.
pub struct Migrator {
    db: DatabaseConnection,
    source: Box<dyn SqlSource>,
    migrations: Vec<MigrationDefinition>,
}

impl Migrator {
    /// Creates a migrator. Call [`Migrator::load_migrations`] before running it.
    pub fn new(db: DatabaseConnection, source: impl SqlSource + 'static) -> Self {
        Self {
            db,
            source: Box::new(source),
            migrations: Vec::new(),
        }
    }

    /// Loads and parses every migration from the source.
    ///
    /// Replaces anything loaded before. On error nothing is kept.
    pub fn load_migrations(&mut self) -> SchemaResult<()> {
        self.migrations = Vec::new();
        self.migrations = load_migrations(self.source.as_ref())?;
        debug!(count = self.migrations.len(), "Loaded migrations");
        Ok(())
    }

    /// Loaded migrations, ascending by version.
    pub fn migrations(&self) -> &[MigrationDefinition] {
        &self.migrations
    }

    /// Consumes the migrator and hands back its connection.
    pub fn into_connection(self) -> DatabaseConnection {
        self.db
    }

    /// Applies every loaded migration missing from the ledger, lowest version first.
    pub async fn migrate(&self) -> SchemaResult<MigrateReport> {
        ledger::ensure_table(&self.db).await?;

        let applied: HashSet<i64> = ledger::applied_versions(&self.db)
            .await?
            .into_iter()
            .collect();

        let mut report = MigrateReport::default();
        for migration in &self.migrations {
            if applied.contains(&migration.version) {
                debug!(migration = %migration.name, "Already applied, skipping");
                report.skipped += 1;
                continue;
            }

            if let Err(err) = self.apply(migration).await {
                error!(migration = %migration.name, error = %err, "Migration failed");
                return Err(err);
            }
            report.applied.push(migration.name.clone());
        }

        Ok(report)
    }

    /// Rolls back up to `steps` migrations, highest applied version first.
    ///
    /// `steps <= 0` does nothing and touches neither the ledger nor the schema.
    pub async fn rollback(&self, steps: i64) -> SchemaResult<RollbackReport> {
        let mut report = RollbackReport::default();
        if steps <= 0 {
            return Ok(report);
        }

        ledger::ensure_table(&self.db).await?;
        let applied = ledger::applied_versions(&self.db).await?;
        let steps = usize::try_from(steps).unwrap_or(usize::MAX);

        for version in applied.into_iter().take(steps) {
            let migration = self
                .find(version)
                .ok_or(SchemaError::MigrationNotFound { version })?;

            if let Err(err) = self.revert(migration).await {
                error!(migration = %migration.name, error = %err, "Rollback failed");
                return Err(err);
            }
            report.rolled_back.push(migration.name.clone());
        }

        Ok(report)
    }

    /// Lists loaded migrations with their applied state, followed by any
    /// ledger rows that no loaded migration accounts for.
    pub async fn status(&self) -> SchemaResult<Vec<MigrationState>> {
        ledger::ensure_table(&self.db).await?;
        let mut recorded = ledger::entries(&self.db).await?;

        let mut states: Vec<MigrationState> = self
            .migrations
            .iter()
            .map(|migration| {
                let status = match recorded.iter().position(|row| row.version == migration.version) {
                    Some(idx) => MigrationStatus::Applied {
                        applied_at: recorded.swap_remove(idx).applied_at,
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationState {
                    version: migration.version,
                    name: migration.name.clone(),
                    status,
                }
            })
            .collect();

        recorded.sort_by_key(|row| row.version);
        states.extend(recorded.into_iter().map(|row| MigrationState {
            version: row.version,
            name: row.name,
            status: MigrationStatus::Orphaned {
                applied_at: row.applied_at,
            },
        }));

        Ok(states)
    }

    fn find(&self, version: i64) -> Option<&MigrationDefinition> {
        self.migrations.iter().find(|m| m.version == version)
    }

    async fn apply(&self, migration: &MigrationDefinition) -> SchemaResult<()> {
        let fail = |stage, source| SchemaError::Apply {
            name: migration.name.clone(),
            stage,
            source,
        };

        let txn = self.db.begin().await.map_err(|e| fail(TxStage::Begin, e))?;

        if !migration.up.is_empty() {
            if let Err(e) = txn.execute_unprepared(&migration.up).await {
                abort(txn, &migration.name).await;
                return Err(fail(TxStage::Execute, e));
            }
        }

        if let Err(e) = ledger::record(&txn, migration.version, &migration.name).await {
            abort(txn, &migration.name).await;
            return Err(fail(TxStage::Record, e));
        }

        txn.commit().await.map_err(|e| fail(TxStage::Commit, e))?;

        info!("Applied migration: {}", migration.name);
        Ok(())
    }

    async fn revert(&self, migration: &MigrationDefinition) -> SchemaResult<()> {
        let fail = |stage, source| SchemaError::Revert {
            name: migration.name.clone(),
            stage,
            source,
        };

        let txn = self.db.begin().await.map_err(|e| fail(TxStage::Begin, e))?;

        if !migration.down.is_empty() {
            if let Err(e) = txn.execute_unprepared(&migration.down).await {
                abort(txn, &migration.name).await;
                return Err(fail(TxStage::Execute, e));
            }
        }

        if let Err(e) = ledger::remove(&txn, migration.version).await {
            abort(txn, &migration.name).await;
            return Err(fail(TxStage::Record, e));
        }

        txn.commit().await.map_err(|e| fail(TxStage::Commit, e))?;

        info!("Rolled back migration: {}", migration.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::{MemorySource, SourceFile};
    use crate::test_support::capture_logs;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn ledger_row(version: i64, name: &str) -> ledger::Model {
        ledger::Model {
            version,
            name: name.to_string(),
            applied_at: None,
        }
    }

    fn users_source() -> MemorySource {
        MemorySource::new([
            SourceFile::new(
                "2_add_email.sql",
                "ALTER TABLE users ADD COLUMN email TEXT;\n-- Down\nALTER TABLE users DROP COLUMN email;",
            ),
            SourceFile::new(
                "1_create_users.sql",
                "CREATE TABLE users(id INT);\n-- Down\nDROP TABLE users;",
            ),
        ])
    }

    fn loaded(db: DatabaseConnection) -> Migrator {
        let mut migrator = Migrator::new(db, users_source());
        migrator.load_migrations().unwrap();
        migrator
    }

    #[tokio::test]
    async fn test_migrate_applies_pending_in_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // ledger DDL, then up + ledger insert for each migration
            .append_exec_results([exec_ok(), exec_ok(), exec_ok(), exec_ok(), exec_ok()])
            .append_query_results([Vec::<ledger::Model>::new()])
            .into_connection();

        let report = loaded(db).migrate().await.unwrap();

        assert_eq!(report.applied, vec!["1_create_users.sql", "2_add_email.sql"]);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_migrate_skips_applied_versions() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok()])
            .append_query_results([vec![
                ledger_row(2, "2_add_email.sql"),
                ledger_row(1, "1_create_users.sql"),
            ]])
            .into_connection();

        let report = loaded(db).migrate().await.unwrap();

        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_migrate_stops_at_first_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .append_exec_errors([DbErr::Custom("column already exists".into())])
            .append_query_results([Vec::<ledger::Model>::new()])
            .into_connection();

        let err = loaded(db).migrate().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert!(matches!(
            err,
            SchemaError::Apply { ref name, stage: TxStage::Execute, .. } if name == "2_add_email.sql"
        ));
    }

    #[tokio::test]
    async fn test_migrate_reports_ledger_insert_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(), exec_ok()])
            .append_exec_errors([DbErr::Custom("duplicate key".into())])
            .append_query_results([Vec::<ledger::Model>::new()])
            .into_connection();

        let err = loaded(db).migrate().await.unwrap_err();

        assert!(matches!(
            err,
            SchemaError::Apply { ref name, stage: TxStage::Record, .. } if name == "1_create_users.sql"
        ));
    }

    #[tokio::test]
    async fn test_rollback_non_positive_steps_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let migrator = loaded(db);

        assert!(migrator.rollback(0).await.unwrap().rolled_back.is_empty());
        assert!(migrator.rollback(-3).await.unwrap().rolled_back.is_empty());

        assert!(migrator.into_connection().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_highest_version_first() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // ledger DDL, then down + ledger delete
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .append_query_results([vec![
                ledger_row(2, "2_add_email.sql"),
                ledger_row(1, "1_create_users.sql"),
            ]])
            .into_connection();

        let report = loaded(db).rollback(1).await.unwrap();

        assert_eq!(report.rolled_back, vec!["2_add_email.sql"]);
    }

    #[tokio::test]
    async fn test_rollback_steps_capped_by_applied_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .append_query_results([vec![ledger_row(1, "1_create_users.sql")]])
            .into_connection();

        let report = loaded(db).rollback(10).await.unwrap();

        assert_eq!(report.rolled_back, vec!["1_create_users.sql"]);
    }

    #[tokio::test]
    async fn test_rollback_unknown_version_aborts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok()])
            .append_query_results([vec![
                ledger_row(3, "3_missing.sql"),
                ledger_row(2, "2_add_email.sql"),
            ]])
            .into_connection();

        let err = loaded(db).rollback(2).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, SchemaError::MigrationNotFound { version: 3 }));
    }

    #[tokio::test]
    async fn test_rollback_keeps_earlier_reverts_when_a_later_one_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // ledger DDL, down + ledger delete for version 2
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .append_exec_errors([DbErr::Custom("table \"users\" does not exist".into())])
            .append_query_results([vec![
                ledger_row(2, "2_add_email.sql"),
                ledger_row(1, "1_create_users.sql"),
            ]])
            .into_connection();
        let (logs, _guard) = capture_logs();

        let err = loaded(db).rollback(2).await.unwrap_err();

        assert!(matches!(
            err,
            SchemaError::Revert { ref name, stage: TxStage::Execute, .. } if name == "1_create_users.sql"
        ));
        let output = logs.contents();
        assert!(output.contains("Rolled back migration: 2_add_email.sql"));
        assert!(!output.contains("Rolled back migration: 1_create_users.sql"));
    }

    #[tokio::test]
    async fn test_rollback_reverts_until_missing_definition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .append_query_results([vec![
                ledger_row(2, "2_add_email.sql"),
                ledger_row(0, "0_ghost.sql"),
            ]])
            .into_connection();
        let (logs, _guard) = capture_logs();

        let err = loaded(db).rollback(2).await.unwrap_err();

        assert!(matches!(err, SchemaError::MigrationNotFound { version: 0 }));
        assert!(logs.contents().contains("Rolled back migration: 2_add_email.sql"));
    }

    #[tokio::test]
    async fn test_migrate_logs_each_applied_migration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(), exec_ok(), exec_ok(), exec_ok(), exec_ok()])
            .append_query_results([Vec::<ledger::Model>::new()])
            .into_connection();
        let (logs, _guard) = capture_logs();

        loaded(db).migrate().await.unwrap();

        let output = logs.contents();
        let first = output.find("Applied migration: 1_create_users.sql").unwrap();
        let second = output.find("Applied migration: 2_add_email.sql").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_status_marks_pending_applied_and_orphaned() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok()])
            .append_query_results([vec![
                ledger_row(1, "1_create_users.sql"),
                ledger_row(9, "9_dropped_file.sql"),
            ]])
            .into_connection();

        let states = loaded(db).status().await.unwrap();

        assert_eq!(
            states,
            vec![
                MigrationState {
                    version: 1,
                    name: "1_create_users.sql".into(),
                    status: MigrationStatus::Applied { applied_at: None },
                },
                MigrationState {
                    version: 2,
                    name: "2_add_email.sql".into(),
                    status: MigrationStatus::Pending,
                },
                MigrationState {
                    version: 9,
                    name: "9_dropped_file.sql".into(),
                    status: MigrationStatus::Orphaned { applied_at: None },
                },
            ]
        );
    }

    #[test]
    fn test_failed_load_keeps_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let mut migrator = Migrator::new(
            db,
            MemorySource::new([SourceFile::new("1_bad.sql", "CREATE TABLE t(id INT);")]),
        );

        assert!(migrator.load_migrations().is_err());
        assert!(migrator.migrations().is_empty());
    }
}

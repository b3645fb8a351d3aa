//! Executes seed scripts.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{debug, error, info};

use super::definition::{SeedDefinition, load_seeds};
use crate::error::{SchemaError, SchemaResult, TxStage};
use crate::source::SqlSource;
use crate::txn::abort;

/// Outcome of [`Seeder::seed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Names of the executed seeds, in order.
    pub executed: Vec<String>,
}

/// Runs seed scripts loaded from a [`SqlSource`].
pub struct Seeder {
    db: DatabaseConnection,
    source: Box<dyn SqlSource>,
    seeds: Vec<SeedDefinition>,
}

impl Seeder {
    /// Creates a seeder. Call [`Seeder::load_seeds`] before running it.
    pub fn new(db: DatabaseConnection, source: impl SqlSource + 'static) -> Self {
        Self {
            db,
            source: Box::new(source),
            seeds: Vec::new(),
        }
    }

    /// Loads every seed from the source, replacing anything loaded before.
    pub fn load_seeds(&mut self) -> SchemaResult<()> {
        self.seeds = Vec::new();
        self.seeds = load_seeds(self.source.as_ref())?;
        debug!(count = self.seeds.len(), "Loaded seeds");
        Ok(())
    }

    /// Loaded seeds, in execution order.
    pub fn seeds(&self) -> &[SeedDefinition] {
        &self.seeds
    }

    /// Consumes the seeder and hands back its connection.
    pub fn into_connection(self) -> DatabaseConnection {
        self.db
    }

    /// Executes every loaded seed, each in its own transaction.
    ///
    /// Stops at the first failing seed. Seeds committed before it stay.
    pub async fn seed(&self) -> SchemaResult<SeedReport> {
        let mut report = SeedReport::default();
        for seed in &self.seeds {
            if let Err(err) = self.execute(seed).await {
                error!(seed = %seed.name, error = %err, "Seed failed");
                return Err(err);
            }
            report.executed.push(seed.name.clone());
        }
        Ok(report)
    }

    async fn execute(&self, seed: &SeedDefinition) -> SchemaResult<()> {
        let fail = |stage, source| SchemaError::Seed {
            name: seed.name.clone(),
            stage,
            source,
        };

        let txn = self.db.begin().await.map_err(|e| fail(TxStage::Begin, e))?;

        for statement in seed.statements() {
            if let Err(e) = txn.execute_unprepared(statement).await {
                abort(txn, &seed.name).await;
                return Err(fail(TxStage::Execute, e));
            }
        }

        txn.commit().await.map_err(|e| fail(TxStage::Commit, e))?;

        info!("Executed seed: {}", seed.name);
        Ok(())
    }
}

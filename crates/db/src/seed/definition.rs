//! Seed file loading.

use crate::error::{SchemaError, SchemaResult};
use crate::source::{SqlSource, is_sql_file};

/// A seed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedDefinition {
    /// Source filename, also the sort key.
    pub name: String,
    /// Semicolon-separated statements.
    pub sql: String,
}

impl SeedDefinition {
    /// Statements of this seed, in file order.
    pub fn statements(&self) -> Vec<&str> {
        split_statements(&self.sql)
    }
}

/// Splits `sql` on `;`, dropping parts that are blank after trimming.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

/// Loads every `.sql` seed from `source`, sorted by filename.
///
/// All files are attempted; if any cannot be read the error lists every
/// failing file.
pub fn load_seeds(source: &dyn SqlSource) -> SchemaResult<Vec<SeedDefinition>> {
    let entries = source
        .entries()
        .map_err(|source| SchemaError::SourceUnavailable {
            what: "seeds",
            source,
        })?;

    let mut seeds = Vec::new();
    let mut failures = Vec::new();
    for name in entries.into_iter().filter(|name| is_sql_file(name)) {
        match source.read(&name) {
            Ok(sql) => seeds.push(SeedDefinition { name, sql }),
            Err(err) => failures.push((name, err)),
        }
    }

    if !failures.is_empty() {
        return Err(SchemaError::SeedLoad { failures });
    }

    seeds.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(seeds)
}

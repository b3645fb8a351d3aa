//! Migration file parsing.
//!
//! A migration file is named `<version>_<description>.sql` and holds the
//! forward SQL, a single `-- Down` marker, then the reverse SQL.

use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::source::{SqlSource, is_sql_file};

/// Marker separating the up and down blocks.
pub const DOWN_MARKER: &str = "-- Down";

/// A parsed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDefinition {
    /// Version taken from the filename prefix.
    pub version: i64,
    /// Source filename.
    pub name: String,
    /// SQL applying the change.
    pub up: String,
    /// SQL reverting the change.
    pub down: String,
}

/// Extracts the version from a `<digits>_<anything>` filename.
pub fn parse_version(filename: &str) -> SchemaResult<i64> {
    let invalid = |reason: &str| SchemaError::InvalidVersionFormat {
        file: filename.to_string(),
        reason: reason.to_string(),
    };

    let Some((prefix, _)) = filename.split_once('_') else {
        return Err(invalid("filename must look like <version>_<description>.sql"));
    };

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("version prefix must be digits"));
    }

    let version: i64 = prefix
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;

    if version == 0 {
        return Err(invalid("version must be positive"));
    }

    Ok(version)
}

/// Parses one migration file.
pub fn parse_migration(filename: &str, contents: &str) -> SchemaResult<MigrationDefinition> {
    let parts: Vec<&str> = contents.split(DOWN_MARKER).collect();
    if parts.len() != 2 {
        return Err(SchemaError::InvalidMigrationFormat {
            file: filename.to_string(),
            occurrences: parts.len() - 1,
        });
    }

    let version = parse_version(filename)?;

    Ok(MigrationDefinition {
        version,
        name: filename.to_string(),
        up: parts[0].trim().to_string(),
        down: parts[1].trim().to_string(),
    })
}

/// Loads every `.sql` migration from `source`, sorted by ascending version.
///
/// Fails on the first unreadable or malformed file. Two files carrying the
/// same version are rejected.
pub fn load_migrations(source: &dyn SqlSource) -> SchemaResult<Vec<MigrationDefinition>> {
    let entries = source
        .entries()
        .map_err(|source| SchemaError::SourceUnavailable {
            what: "migrations",
            source,
        })?;

    let mut migrations = Vec::new();
    for name in entries.into_iter().filter(|name| is_sql_file(name)) {
        let contents = source.read(&name).map_err(|source| SchemaError::Read {
            file: name.clone(),
            source,
        })?;
        migrations.push(parse_migration(&name, &contents)?);
    }

    migrations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));

    let mut seen: HashMap<i64, &str> = HashMap::new();
    for migration in &migrations {
        if let Some(first) = seen.insert(migration.version, &migration.name) {
            return Err(SchemaError::DuplicateVersion {
                version: migration.version,
                first: first.to_string(),
                second: migration.name.clone(),
            });
        }
    }

    Ok(migrations)
}

//! Creation of new, empty migration files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::definition::DOWN_MARKER;
use crate::error::{SchemaError, SchemaResult};

/// Turns a free-form description into a filename slug.
///
/// Lower-cases ASCII alphanumerics and collapses every other run of
/// characters into a single `_`.
pub fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    for c in description.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Writes `<YYYYMMDDHHMMSS>_<slug>.sql` into `dir` and returns its path.
///
/// The file parses as a migration with empty up and down blocks. An existing
/// file is never overwritten.
pub fn create_migration(dir: &Path, description: &str, now: DateTime<Utc>) -> SchemaResult<PathBuf> {
    let slug = slugify(description);
    if slug.is_empty() {
        return Err(SchemaError::Scaffold(format!(
            "description {description:?} has no usable characters"
        )));
    }

    fs::create_dir_all(dir).map_err(|e| {
        SchemaError::Scaffold(format!("cannot create {}: {e}", dir.display()))
    })?;

    let filename = format!("{}_{slug}.sql", now.format("%Y%m%d%H%M%S"));
    let path = dir.join(&filename);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| SchemaError::Scaffold(format!("cannot create {}: {e}", path.display())))?;

    let template = format!(
        "-- Migration: {slug}\n\
         -- Created: {}\n\
         \n\
         \n\
         {DOWN_MARKER}\n\
         \n",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    file.write_all(template.as_bytes())
        .map_err(|e| SchemaError::Scaffold(format!("cannot write {}: {e}", path.display())))?;

    Ok(path)
}

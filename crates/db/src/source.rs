//! Read-only collections of named SQL files.
//!
//! Migrations and seeds are read through [`SqlSource`], so the same loaders
//! work on a directory on disk and on files compiled into the binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A named text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name, e.g. `1_create_users.sql`.
    pub name: String,
    /// File contents.
    pub contents: String,
}

impl SourceFile {
    /// Creates a source file.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// A read-only set of named files.
pub trait SqlSource: Send + Sync {
    /// Lists the file names in the source.
    fn entries(&self) -> io::Result<Vec<String>>;

    /// Reads one file by name.
    fn read(&self, name: &str) -> io::Result<String>;
}

/// Returns true when `name` has the `.sql` extension.
pub fn is_sql_file(name: &str) -> bool {
    Path::new(name).extension().is_some_and(|ext| ext == "sql")
}

/// Files in a single directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    /// Creates a source over `dir`. The directory is not touched until read.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory this source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SqlSource for DirSource {
    fn entries(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            // Non UTF-8 names cannot match `<version>_<name>.sql` anyway.
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.dir.join(name))
    }
}

/// Files held in memory, typically built from `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<SourceFile>,
}

impl MemorySource {
    /// Creates a source from the given files.
    pub fn new(files: impl IntoIterator<Item = SourceFile>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }
}

impl SqlSource for MemorySource {
    fn entries(&self) -> io::Result<Vec<String>> {
        Ok(self.files.iter().map(|f| f.name.clone()).collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.contents.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{name} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1_init.sql", true)]
    #[case("01_users.SQL", false)]
    #[case("README.md", false)]
    #[case("backup.sql.bak", false)]
    #[case("sql", false)]
    fn test_is_sql_file(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_sql_file(name), expected);
    }

    #[test]
    fn test_dir_source_lists_sorted_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2_b.sql"), "b").unwrap();
        fs::write(dir.path().join("1_a.sql"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "n").unwrap();

        let source = DirSource::new(dir.path());

        assert_eq!(
            source.entries().unwrap(),
            vec!["1_a.sql", "2_b.sql", "notes.txt"]
        );
        assert_eq!(source.read("1_a.sql").unwrap(), "a");
    }

    #[test]
    fn test_dir_source_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path().join("absent"));

        assert_eq!(
            source.entries().unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_memory_source_unknown_file() {
        let source = MemorySource::new([SourceFile::new("1_a.sql", "SELECT 1")]);

        assert_eq!(source.read("1_a.sql").unwrap(), "SELECT 1");
        assert_eq!(
            source.read("2_b.sql").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}

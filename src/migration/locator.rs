//! Migration locators - enumerate every known migration identifier in order

use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

static FILENAME_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^m(\d{14})_(\w+)\.rs$"));

/// Source of the canonical, ordered list of migration identifiers
///
/// The order is the intended forward-application order: index 0 applies first.
/// The migrator never reorders this list, except to reverse applied
/// migrations for rollback. Implementations must return the same list on
/// every call while their underlying sources are unchanged.
pub trait MigrationLocator {
    fn get_migrations(&self) -> Result<Vec<String>, MigrationError>;
}

/// Locator over a fixed in-memory list
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    migrations: Vec<String>,
}

impl StaticLocator {
    pub fn new<I, S>(migrations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            migrations: migrations.into_iter().map(Into::into).collect(),
        }
    }
}

impl MigrationLocator for StaticLocator {
    fn get_migrations(&self) -> Result<Vec<String>, MigrationError> {
        Ok(self.migrations.clone())
    }
}

/// A discovered migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path to the migration file
    pub path: PathBuf,

    /// Migration version (timestamp: YYYYMMDDHHMMSS)
    pub version: i64,

    /// Human-readable migration name
    pub name: String,
}

impl MigrationFile {
    /// File stem, e.g. `m20240120120000_create_users_table`
    #[must_use]
    pub fn stem(&self) -> String {
        format!("m{:014}_{}", self.version, self.name)
    }

    /// Parse migration file name to extract version and name
    ///
    /// Expected format: `m{YYYYMMDDHHMMSS}_{name}.rs`
    ///
    /// # Example
    /// - `m20240120120000_create_users_table.rs` → version: 20240120120000, name: "create_users_table"
    pub fn parse_filename(filename: &str) -> Result<(i64, String), MigrationError> {
        let re = FILENAME_RE
            .as_ref()
            .map_err(|e| MigrationError::InvalidFormat(format!("Invalid regex: {e}")))?;

        let invalid = || {
            MigrationError::InvalidFormat(format!(
                "Migration file name '{filename}' does not match expected pattern: \
                 m{{YYYYMMDDHHMMSS}}_{{name}}.rs"
            ))
        };

        let caps = re.captures(filename).ok_or_else(invalid)?;
        let (Some(version), Some(name)) = (caps.get(1), caps.get(2)) else {
            return Err(invalid());
        };
        let version = version.as_str().parse::<i64>().map_err(|_| invalid())?;

        Ok((version, name.as_str().to_string()))
    }
}

/// Discover all migration files in a directory
///
/// Only `.rs` files are considered; results are sorted by version (oldest first).
///
/// # Errors
///
/// Returns errors if:
/// - The directory doesn't exist or can't be read
/// - A `.rs` file has an invalid name
pub fn discover_migrations(migrations_dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    if !migrations_dir.is_dir() {
        return Err(MigrationError::FileNotFound(
            migrations_dir.display().to_string(),
        ));
    }

    let entries = fs::read_dir(migrations_dir).map_err(|e| {
        MigrationError::FileNotFound(format!(
            "Failed to read migrations directory {}: {e}",
            migrations_dir.display()
        ))
    })?;

    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| {
                MigrationError::FileNotFound(format!("Failed to read directory entry: {e}"))
            })?
            .path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }

        let filename = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            MigrationError::InvalidFormat(format!("Invalid filename: {}", path.display()))
        })?;

        // `mod.rs` wires the directory up as a Rust module; it is not a migration
        if filename == "mod.rs" {
            continue;
        }

        let (version, name) = MigrationFile::parse_filename(filename)?;
        migrations.push(MigrationFile {
            path,
            version,
            name,
        });
    }

    // Same version in two files would make the order ambiguous
    migrations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));

    Ok(migrations)
}

/// Locator that scans migration directories
///
/// Each source is a `(namespace, directory)` pair. Sources are visited in the
/// order they were added; files inside a source are ordered by version. A file
/// `m20240120120000_create_users.rs` in namespace `app::migrations` yields the
/// identifier `app::migrations::m20240120120000_create_users`.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLocator {
    sources: Vec<(String, PathBuf)>,
}

impl DirectoryLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source directory; builder style
    #[must_use]
    pub fn with_source(mut self, namespace: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        self.add_source(namespace, dir);
        self
    }

    pub fn add_source(&mut self, namespace: impl Into<String>, dir: impl AsRef<Path>) {
        self.sources
            .push((namespace.into(), dir.as_ref().to_path_buf()));
    }

    /// Identifier for a file found under `namespace`
    #[must_use]
    pub fn identifier(namespace: &str, file: &MigrationFile) -> String {
        let namespace = namespace.trim_end_matches("::");
        if namespace.is_empty() {
            file.stem()
        } else {
            format!("{namespace}::{}", file.stem())
        }
    }
}

impl MigrationLocator for DirectoryLocator {
    fn get_migrations(&self) -> Result<Vec<String>, MigrationError> {
        let mut seen = HashSet::new();
        let mut migrations = Vec::new();

        for (namespace, dir) in &self.sources {
            for file in discover_migrations(dir)? {
                let id = Self::identifier(namespace, &file);
                if seen.insert(id.clone()) {
                    migrations.push(id);
                }
            }
        }

        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::expect_used)] // Test code - expect is acceptable
    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "// migration\n").expect("write file");
    }

    #[test]
    fn test_parse_filename() {
        let parsed = MigrationFile::parse_filename("m20240120120000_create_users_table.rs");
        assert_eq!(
            parsed.ok(),
            Some((20_240_120_120_000, "create_users_table".to_string()))
        );

        for bad in [
            "20240120120000_create_users.rs",
            "m2024_create_users.rs",
            "m20240120120000_create-users.rs",
            "m20240120120000_.rs",
        ] {
            assert!(
                matches!(
                    MigrationFile::parse_filename(bad),
                    Err(MigrationError::InvalidFormat(_))
                ),
                "Should reject: {bad}"
            );
        }
    }

    #[test]
    fn test_static_locator_keeps_order() {
        let locator = StaticLocator::new(["b", "a", "c"]);
        assert_eq!(
            locator.get_migrations().ok(),
            Some(vec!["b".to_string(), "a".to_string(), "c".to_string()])
        );
    }

    #[test]
    #[allow(clippy::expect_used)] // Test code - expect is acceptable
    fn test_directory_locator_orders_by_source_then_version() {
        let core = tempfile::tempdir().expect("tempdir");
        let account = tempfile::tempdir().expect("tempdir");

        touch(core.path(), "m20240102000000_create_password_resets.rs");
        touch(core.path(), "m20240101000000_create_users.rs");
        touch(core.path(), "mod.rs");
        touch(core.path(), "README.md");
        touch(account.path(), "m20230101000000_create_groups.rs");

        let locator = DirectoryLocator::new()
            .with_source("core::migrations", core.path())
            .with_source("account::migrations::", account.path());

        let migrations = locator.get_migrations().expect("locate");
        assert_eq!(
            migrations,
            vec![
                "core::migrations::m20240101000000_create_users",
                "core::migrations::m20240102000000_create_password_resets",
                "account::migrations::m20230101000000_create_groups",
            ]
        );

        // Stable across calls
        assert_eq!(locator.get_migrations().expect("locate again"), migrations);
    }

    #[test]
    #[allow(clippy::expect_used)] // Test code - expect is acceptable
    fn test_directory_locator_collapses_duplicate_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "m20240101000000_create_users.rs");

        let locator = DirectoryLocator::new()
            .with_source("app", dir.path())
            .with_source("app", dir.path());

        assert_eq!(
            locator.get_migrations().expect("locate"),
            vec!["app::m20240101000000_create_users"]
        );
    }

    #[test]
    #[allow(clippy::expect_used)] // Test code - expect is acceptable
    fn test_directory_locator_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        let locator = DirectoryLocator::new().with_source("app", &missing);
        assert!(matches!(
            locator.get_migrations(),
            Err(MigrationError::FileNotFound(_))
        ));

        touch(dir.path(), "create_users.rs");
        let locator = DirectoryLocator::new().with_source("app", dir.path());
        assert!(matches!(
            locator.get_migrations(),
            Err(MigrationError::InvalidFormat(_))
        ));
    }
}

//! `MigrationRecord` - Represents entries in the migration repository table

use crate::executor::Row;
use crate::LifeError;

/// One row of the migration repository: which migration ran, and in which batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Fully-qualified migration identifier
    pub migration: String,

    /// Batch the migration was applied in (starts at 1)
    pub batch: i64,
}

impl MigrationRecord {
    /// Create a new `MigrationRecord`
    #[must_use]
    pub fn new(migration: impl Into<String>, batch: i64) -> Self {
        Self {
            migration: migration.into(),
            batch,
        }
    }

    /// Create a `MigrationRecord` from a database row
    ///
    /// Expected column order: `migration`, `batch`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if a column is missing, `NULL` or mistyped.
    pub fn from_row(row: &Row) -> Result<Self, LifeError> {
        let migration = row.get_string(0)?;
        let batch = row.get_i64(1)?.ok_or_else(|| {
            LifeError::ParseError(format!("migration '{migration}' has a NULL batch"))
        })?;

        Ok(Self { migration, batch })
    }
}

//! Migration state table management

use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{ColumnDef, Table, TableCreateStatement};

/// Default name of the migration repository table
pub const DEFAULT_TABLE: &str = "migrations";

static TABLE_NAME_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$"));

/// Check that a table name is a plain SQL identifier
///
/// Table names are spliced into hand-written queries, so only
/// `[A-Za-z_][A-Za-z0-9_]*` (at most 63 characters) is accepted.
///
/// # Errors
///
/// Returns `MigrationError::InvalidFormat` for any other name.
pub fn validate_table_name(table: &str) -> Result<(), MigrationError> {
    let re = TABLE_NAME_RE
        .as_ref()
        .map_err(|e| MigrationError::InvalidFormat(format!("Invalid regex: {e}")))?;

    if re.is_match(table) {
        Ok(())
    } else {
        Err(MigrationError::InvalidFormat(format!(
            "'{table}' is not a valid migration table name (expected letters, digits and underscores)"
        )))
    }
}

/// Create the migration repository table
///
/// Columns:
/// - `id` (auto-increment, gives insertion order within a batch)
/// - `migration` (identifier, unique)
/// - `batch` (run number, starts at 1)
///
/// The statement uses `IF NOT EXISTS`, so executing it twice is a no-op.
pub fn create_state_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(table.to_string())
        .if_not_exists()
        .col(
            ColumnDef::new("id")
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new("migration")
                .string()
                .string_len(255)
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new("batch").integer().not_null())
        .to_owned()
}

/// Create the single-row lock table used by [`MigrationLock`](super::MigrationLock)
pub fn create_lock_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(table.to_string())
        .if_not_exists()
        .col(ColumnDef::new("id").integer().not_null().primary_key())
        .col(ColumnDef::new("holder").string().string_len(255).not_null())
        .to_owned()
}

//! Migration repository - the persisted ledger of applied migrations

use crate::executor::{quote_literal, Executor};
use crate::migration::state_table::{create_state_table, validate_table_name};
use crate::migration::{MigrationError, MigrationRecord};
use crate::render;

/// Ledger of executed migration identifiers and the batch each ran in
///
/// The repository knows nothing about how migrations execute; it only records
/// which identifiers have been applied. All storage failures are reported as
/// [`MigrationError::Storage`].
pub trait MigrationRepository {
    /// Whether the ledger's backing table exists
    fn repository_exists(&self) -> Result<bool, MigrationError>;

    /// Create the backing table
    ///
    /// Idempotent: calling it when the table already exists is a no-op.
    fn create_repository(&self) -> Result<(), MigrationError>;

    /// All applied identifiers, by ascending batch then insertion order
    fn get_ran(&self) -> Result<Vec<String>, MigrationError>;

    /// Identifiers of the most recent batch only, last-applied first
    fn get_last(&self) -> Result<Vec<String>, MigrationError>;

    /// Record `migration` as applied in `batch`
    ///
    /// Fails with [`MigrationError::DuplicateRecord`] if it is already recorded.
    fn log(&self, migration: &str, batch: i64) -> Result<(), MigrationError>;

    /// Remove the record for `migration`
    ///
    /// Deleting an identifier that is not recorded is a no-op.
    fn delete(&self, migration: &str) -> Result<(), MigrationError>;

    /// `1 + max(batch)`, or `1` when nothing has been recorded
    fn get_next_batch_number(&self) -> Result<i64, MigrationError>;
}

/// [`MigrationRepository`] stored in a database table
///
/// ```no_run
/// use waypoint::migration::{DatabaseMigrationRepository, MigrationRepository};
/// use waypoint::SqliteExecutor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = SqliteExecutor::open("app.db")?;
/// let repository = DatabaseMigrationRepository::new(&executor, "migrations")?;
/// if !repository.repository_exists()? {
///     repository.create_repository()?;
/// }
/// println!("applied: {:?}", repository.get_ran()?);
/// # Ok(())
/// # }
/// ```
pub struct DatabaseMigrationRepository<'a> {
    executor: &'a dyn Executor,
    table: String,
    quoted: String,
}

impl<'a> DatabaseMigrationRepository<'a> {
    /// Create a repository over `table`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFormat` if `table` is not a plain identifier.
    pub fn new(executor: &'a dyn Executor, table: impl Into<String>) -> Result<Self, MigrationError> {
        let table = table.into();
        validate_table_name(&table)?;
        let quoted = format!("\"{table}\"");
        Ok(Self {
            executor,
            table,
            quoted,
        })
    }

    /// Name of the backing table
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All records, by ascending batch then insertion order
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Storage` if the table cannot be queried.
    pub fn get_records(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let sql = format!(
            "SELECT migration, batch FROM {} ORDER BY batch ASC, id ASC",
            self.quoted
        );
        self.query_records(&sql)
    }

    /// Highest recorded batch, or `0` when empty
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Storage` if the table cannot be queried.
    pub fn get_last_batch_number(&self) -> Result<i64, MigrationError> {
        let sql = format!("SELECT COALESCE(MAX(batch), 0) FROM {}", self.quoted);
        let row = self.executor.query_one(&sql)?;
        Ok(row.get_i64(0)?.unwrap_or(0))
    }

    fn query_records(&self, sql: &str) -> Result<Vec<MigrationRecord>, MigrationError> {
        let rows = self.executor.query_all(sql)?;
        let records = rows
            .iter()
            .map(MigrationRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn is_logged(&self, migration: &str) -> Result<bool, MigrationError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE migration = {}",
            self.quoted,
            quote_literal(migration)
        );
        let row = self.executor.query_one(&sql)?;
        Ok(row.get_i64(0)?.unwrap_or(0) > 0)
    }
}

impl MigrationRepository for DatabaseMigrationRepository<'_> {
    fn repository_exists(&self) -> Result<bool, MigrationError> {
        Ok(self.executor.has_table(&self.table)?)
    }

    fn create_repository(&self) -> Result<(), MigrationError> {
        let sql = render!(self.executor.dialect(), create_state_table(&self.table));
        self.executor.execute(&sql)?;
        log::debug!("Migration repository table '{}' is ready", self.table);
        Ok(())
    }

    fn get_ran(&self) -> Result<Vec<String>, MigrationError> {
        Ok(self
            .get_records()?
            .into_iter()
            .map(|record| record.migration)
            .collect())
    }

    fn get_last(&self) -> Result<Vec<String>, MigrationError> {
        let sql = format!(
            "SELECT migration, batch FROM {t} \
             WHERE batch = (SELECT MAX(batch) FROM {t}) \
             ORDER BY id DESC",
            t = self.quoted
        );
        Ok(self
            .query_records(&sql)?
            .into_iter()
            .map(|record| record.migration)
            .collect())
    }

    fn log(&self, migration: &str, batch: i64) -> Result<(), MigrationError> {
        if self.is_logged(migration)? {
            return Err(MigrationError::DuplicateRecord(migration.to_string()));
        }

        let sql = format!(
            "INSERT INTO {} (migration, batch) VALUES ({}, {batch})",
            self.quoted,
            quote_literal(migration)
        );
        self.executor.execute(&sql)?;
        Ok(())
    }

    fn delete(&self, migration: &str) -> Result<(), MigrationError> {
        let sql = format!(
            "DELETE FROM {} WHERE migration = {}",
            self.quoted,
            quote_literal(migration)
        );
        self.executor.execute(&sql)?;
        Ok(())
    }

    fn get_next_batch_number(&self) -> Result<i64, MigrationError> {
        Ok(self.get_last_batch_number()? + 1)
    }
}

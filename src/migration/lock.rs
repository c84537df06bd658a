//! Table-based advisory lock serializing migrator runs across processes

use crate::executor::{quote_literal, Executor};
use crate::migration::state_table::{create_lock_table, validate_table_name};
use crate::migration::MigrationError;
use crate::render;
use std::time::{Duration, Instant};

/// Primary key of the single lock row
const LOCK_ROW_ID: i64 = 1;

/// Delay between acquisition attempts
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Advisory lock stored as a single row in its own table
///
/// The process whose `INSERT` of the lock row succeeds holds the lock; everyone
/// else polls until the row disappears or the timeout runs out. The migrator
/// itself assumes a single writer, so embedders running several instances
/// should hold this lock around `run`/`rollback`/`reset`.
pub struct MigrationLock<'a> {
    executor: &'a dyn Executor,
    table: String,
    quoted: String,
}

impl<'a> MigrationLock<'a> {
    /// Create a lock over `table`, creating the table if needed
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidFormat` for an invalid table name and
    /// `MigrationError::Storage` if the table cannot be created.
    pub fn new(executor: &'a dyn Executor, table: impl Into<String>) -> Result<Self, MigrationError> {
        let table = table.into();
        validate_table_name(&table)?;
        executor.execute(&render!(executor.dialect(), create_lock_table(&table)))?;
        let quoted = format!("\"{table}\"");
        Ok(Self {
            executor,
            table,
            quoted,
        })
    }

    /// Name of the lock table
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Try once to take the lock; `Ok(false)` if another holder has it
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Storage` if the insert fails.
    pub fn try_acquire(&self) -> Result<bool, MigrationError> {
        let holder = format!("pid:{}", std::process::id());
        let sql = format!(
            "INSERT INTO {} (id, holder) VALUES ({LOCK_ROW_ID}, {}) ON CONFLICT (id) DO NOTHING",
            self.quoted,
            quote_literal(&holder)
        );
        Ok(self.executor.execute(&sql)? > 0)
    }

    /// Take the lock, polling until `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::LockTimeout` if the lock is still held by someone
    /// else when the timeout runs out.
    pub fn acquire(&self, timeout: Duration) -> Result<MigrationLockGuard<'_, 'a>, MigrationError> {
        let start = Instant::now();
        loop {
            if self.try_acquire()? {
                log::debug!("Acquired migration lock '{}'", self.table);
                return Ok(MigrationLockGuard { lock: self });
            }

            if start.elapsed() >= timeout {
                return Err(MigrationError::LockTimeout(format!(
                    "Failed to acquire migration lock within {} seconds. \
                     If no migration is running, delete the stale lock row: \
                     DELETE FROM {} WHERE id = {LOCK_ROW_ID}",
                    timeout.as_secs(),
                    self.table
                )));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Release the lock by deleting the lock row
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Storage` if the delete fails.
    pub fn release(&self) -> Result<(), MigrationError> {
        let sql = format!("DELETE FROM {} WHERE id = {LOCK_ROW_ID}", self.quoted);
        self.executor.execute(&sql)?;
        Ok(())
    }

    /// Check if the lock is currently held
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Storage` if the lock table cannot be queried.
    pub fn is_held(&self) -> Result<bool, MigrationError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE id = {LOCK_ROW_ID}",
            self.quoted
        );
        let row = self.executor.query_one(&sql)?;
        Ok(row.get_i64(0)?.unwrap_or(0) > 0)
    }
}

/// Guard that releases the lock when dropped
pub struct MigrationLockGuard<'l, 'a> {
    lock: &'l MigrationLock<'a>,
}

impl Drop for MigrationLockGuard<'_, '_> {
    fn drop(&mut self) {
        // Errors cannot propagate out of drop
        if let Err(e) = self.lock.release() {
            log::warn!("Failed to release migration lock '{}': {e}", self.lock.table);
        }
    }
}

//! Migration-specific error types

use crate::LifeError;
use thiserror::Error;

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The repository table could not be created or queried
    #[error("Migration repository storage error: {0}")]
    Storage(#[source] LifeError),

    /// A migration was logged twice
    #[error(
        "Migration '{0}' is already recorded in the repository.\n\
         This usually means two processes ran migrations at the same time."
    )]
    DuplicateRecord(String),

    /// An identifier resolved to no runnable unit, even under its deprecated name
    #[error(
        "Migration '{0}' could not be resolved to a registered migration.\n\
         Suggestion: register it with `MigrationResolver::register()` or, for a \
         legacy name, `MigrationResolver::register_legacy()`"
    )]
    BadClassName(String),

    /// A migration's `up()` or `down()` failed
    #[error("Migration '{migration}' failed during execution: {source}")]
    Execution {
        migration: String,
        #[source]
        source: LifeError,
    },

    /// A migration was registered twice under the same key
    #[error("Migration '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Migration source directory not found
    #[error("Migration source not found: {0}")]
    FileNotFound(String),

    /// Invalid migration file name or repository table name
    #[error("Invalid migration format: {0}")]
    InvalidFormat(String),

    /// Migration lock timeout
    #[error(
        "Migration lock timeout: {0}\n\
         Another process may be running migrations. If this persists, check for:\n\
         - Stuck migration process\n\
         - Database connection issues\n\
         - A stale row in the migration lock table"
    )]
    LockTimeout(String),
}

impl From<LifeError> for MigrationError {
    fn from(error: LifeError) -> Self {
        MigrationError::Storage(error)
    }
}

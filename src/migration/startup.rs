//! In-process migration execution helpers

use crate::migration::{MigrateOptions, MigrationError, MigrationLock, Migrator};
use std::time::Duration;

/// Default time to wait for the migration lock
pub const DEFAULT_LOCK_TIMEOUT_SECONDS: u64 = 60;

/// Run migrations on application startup
///
/// Creates the repository if it does not exist, takes the advisory lock in
/// `lock_table` and applies every pending migration as one batch. The lock is
/// released when this returns, whether or not the run succeeded.
///
/// # Behavior
///
/// - **First process wins:** the first process to take the lock applies the migrations
/// - **Other processes wait:** they poll for up to `timeout_seconds` (default 60), then
///   find nothing pending
/// - **Fail-fast:** a failing migration is returned as an error; the application
///   should not start
///
/// # Example
///
/// ```rust,no_run
/// use waypoint::migration::{
///     startup_migrations, DatabaseMigrationRepository, MigrationResolver, Migrator, StaticLocator,
/// };
/// use waypoint::SqliteExecutor;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let executor = SqliteExecutor::open("app.db")?;
///     let repository = DatabaseMigrationRepository::new(&executor, "migrations")?;
///     let mut migrator = Migrator::new(
///         repository,
///         &executor,
///         StaticLocator::new(Vec::<String>::new()),
///         MigrationResolver::new(),
///     );
///
///     startup_migrations(&mut migrator, "migrations_lock", None)?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// - `MigrationError::LockTimeout` if the lock cannot be acquired in time
/// - Any error from [`Migrator::run`]
pub fn startup_migrations(
    migrator: &mut Migrator<'_>,
    lock_table: &str,
    timeout_seconds: Option<u64>,
) -> Result<Vec<String>, MigrationError> {
    if !migrator.repository_exists()? {
        log::info!("Creating migration repository");
        migrator.create_repository()?;
    }

    let timeout = Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_LOCK_TIMEOUT_SECONDS));
    let lock = MigrationLock::new(migrator.executor(), lock_table)?;
    let _guard = lock.acquire(timeout)?;

    let applied = migrator.run(MigrateOptions::default())?;

    if applied.is_empty() {
        log::debug!("No pending migrations to apply");
    } else {
        log::info!("Applied {} migration(s) on startup", applied.len());
    }

    Ok(applied)
}

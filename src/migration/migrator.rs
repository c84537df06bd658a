//! Migrator - Core migration execution engine

use crate::executor::Executor;
use crate::migration::{
    MigrationError, MigrationLocator, MigrationRepository, MigrationResolver, MigrationStatus,
    SchemaManager,
};
use std::collections::HashSet;

/// Per-call options for [`Migrator::run`], [`Migrator::rollback`] and [`Migrator::reset`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Report the statements each migration would execute, without executing
    /// them or touching the repository
    pub pretend: bool,
}

impl MigrateOptions {
    #[must_use]
    pub fn pretend() -> Self {
        Self { pretend: true }
    }
}

/// Direction for migration execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Apply the migration (up) and log it in the given batch
    Up(i64),
    /// Reverse the migration (down) and delete its record
    Down,
}

/// Core migration execution engine
///
/// The `Migrator` takes the ordered identifier list from a [`MigrationLocator`],
/// compares it with what the [`MigrationRepository`] has recorded, resolves each
/// identifier through a [`MigrationResolver`] and runs it against the executor.
///
/// Every step is recorded as soon as it succeeds. When a step fails, the error is
/// returned unchanged and the steps before it stay applied and recorded.
///
/// # Example
///
/// ```rust,no_run
/// use waypoint::migration::{
///     DatabaseMigrationRepository, MigrateOptions, MigrationRepository, MigrationResolver,
///     Migrator, StaticLocator,
/// };
/// use waypoint::SqliteExecutor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = SqliteExecutor::open("app.db")?;
/// let repository = DatabaseMigrationRepository::new(&executor, "migrations")?;
/// let resolver = MigrationResolver::new(); // register migrations here
/// let locator = StaticLocator::new(["app::CreateUsersTable"]);
///
/// let mut migrator = Migrator::new(repository, &executor, locator, resolver);
/// if !migrator.repository_exists()? {
///     migrator.create_repository()?;
/// }
/// let ran = migrator.run(MigrateOptions::default())?;
/// for note in migrator.notes() {
///     println!("{note}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Migrator<'a> {
    repository: Box<dyn MigrationRepository + 'a>,
    executor: &'a dyn Executor,
    locator: Box<dyn MigrationLocator + 'a>,
    resolver: MigrationResolver,
    notes: Vec<String>,
}

impl<'a> Migrator<'a> {
    pub fn new(
        repository: impl MigrationRepository + 'a,
        executor: &'a dyn Executor,
        locator: impl MigrationLocator + 'a,
        resolver: MigrationResolver,
    ) -> Self {
        Self {
            repository: Box::new(repository),
            executor,
            locator: Box::new(locator),
            resolver,
            notes: Vec::new(),
        }
    }

    /// Swap the active locator; takes effect on the next operation
    pub fn set_locator(&mut self, locator: impl MigrationLocator + 'a) {
        self.locator = Box::new(locator);
    }

    pub fn locator(&self) -> &dyn MigrationLocator {
        self.locator.as_ref()
    }

    pub fn repository(&self) -> &dyn MigrationRepository {
        self.repository.as_ref()
    }

    pub fn resolver(&self) -> &MigrationResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut MigrationResolver {
        &mut self.resolver
    }

    pub fn executor(&self) -> &'a dyn Executor {
        self.executor
    }

    /// Notes from the most recent `run`, `rollback` or `reset`
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn repository_exists(&self) -> Result<bool, MigrationError> {
        self.repository.repository_exists()
    }

    pub fn create_repository(&self) -> Result<(), MigrationError> {
        self.repository.create_repository()
    }

    fn note(&mut self, note: String) {
        log::debug!("{note}");
        self.notes.push(note);
    }

    /// Applied and pending migrations, without running anything
    ///
    /// Applied migrations that the locator no longer lists are still reported
    /// as applied.
    pub fn status(&self) -> Result<MigrationStatus, MigrationError> {
        let ran = self.repository.get_ran()?;
        let pending = self.pending_migrations(&ran)?;
        Ok(MigrationStatus::new(ran, pending))
    }

    /// Located migrations not yet ran, in locator order; repeats keep the first occurrence
    fn pending_migrations(&self, ran: &[String]) -> Result<Vec<String>, MigrationError> {
        let mut seen: HashSet<String> = ran.iter().cloned().collect();
        Ok(self
            .locator
            .get_migrations()?
            .into_iter()
            .filter(|migration| seen.insert(migration.clone()))
            .collect())
    }

    /// Apply every pending migration as one new batch
    ///
    /// Returns the identifiers processed, in application order. With nothing
    /// pending this notes "Nothing to migrate" and returns an empty list.
    ///
    /// # Errors
    ///
    /// - `MigrationError::Storage` if the repository cannot be read or written
    /// - `MigrationError::BadClassName` if an identifier cannot be resolved
    /// - `MigrationError::Execution` if a migration's `up()` fails
    ///
    /// Migrations applied before the failing one stay applied and recorded.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn run(&mut self, options: MigrateOptions) -> Result<Vec<String>, MigrationError> {
        self.notes.clear();

        let ran = self.repository.get_ran()?;
        let pending = self.pending_migrations(&ran)?;

        if pending.is_empty() {
            self.note("Nothing to migrate".to_string());
            return Ok(pending);
        }

        let batch = self.repository.get_next_batch_number()?;

        for migration in &pending {
            self.run_step(migration, Direction::Up(batch), options)?;
        }

        if !options.pretend {
            log::info!("Applied {} migration(s) in batch {batch}", pending.len());
        }

        Ok(pending)
    }

    /// Reverse the most recent batch, last-applied migration first
    ///
    /// With nothing recorded this notes "Nothing to rollback" and returns an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), with `down()` in place of `up()`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn rollback(&mut self, options: MigrateOptions) -> Result<Vec<String>, MigrationError> {
        self.notes.clear();
        let last = self.repository.get_last()?;
        self.roll_back(last, options)
    }

    /// Reverse every recorded migration, newest batch first
    ///
    /// Inside each batch migrations are reversed last-applied first. Returns the
    /// full list in the order it was reversed.
    ///
    /// # Errors
    ///
    /// Same as [`rollback`](Self::rollback).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn reset(&mut self, options: MigrateOptions) -> Result<Vec<String>, MigrationError> {
        self.notes.clear();
        let mut ran = self.repository.get_ran()?;
        ran.reverse();
        self.roll_back(ran, options)
    }

    fn roll_back(
        &mut self,
        migrations: Vec<String>,
        options: MigrateOptions,
    ) -> Result<Vec<String>, MigrationError> {
        if migrations.is_empty() {
            self.note("Nothing to rollback".to_string());
            return Ok(migrations);
        }

        for migration in &migrations {
            self.run_step(migration, Direction::Down, options)?;
        }

        if !options.pretend {
            log::info!("Rolled back {} migration(s)", migrations.len());
        }

        Ok(migrations)
    }

    fn run_step(
        &mut self,
        migration: &str,
        direction: Direction,
        options: MigrateOptions,
    ) -> Result<(), MigrationError> {
        let resolved = self.resolver.resolve(migration)?;
        if let Some(key) = &resolved.legacy_key {
            log::warn!("Migration '{migration}' resolved through deprecated name '{key}'");
            self.note(format!(
                "Resolved deprecated migration name: {migration} (as '{key}')"
            ));
        }

        let execution_error = |source| MigrationError::Execution {
            migration: migration.to_string(),
            source,
        };

        if options.pretend {
            let manager = SchemaManager::pretend(self.executor);
            let described = match direction {
                Direction::Up(_) => {
                    self.note(format!("Migrating: {migration}"));
                    resolved.migration.up(&manager)
                }
                Direction::Down => {
                    self.note(format!("Rolling back: {migration}"));
                    resolved.migration.down(&manager)
                }
            };
            described.map_err(execution_error)?;

            let statements = manager.take_statements();
            if statements.is_empty() {
                self.note(format!("{migration}: no schema changes"));
            }
            for sql in statements {
                self.note(format!("{migration}: {sql}"));
            }
            return Ok(());
        }

        let manager = SchemaManager::new(self.executor);
        match direction {
            Direction::Up(batch) => {
                self.note(format!("Migrating: {migration}"));
                resolved.migration.up(&manager).map_err(execution_error)?;
                self.repository.log(migration, batch)?;
                self.note(format!("Migrated: {migration}"));
            }
            Direction::Down => {
                self.note(format!("Rolling back: {migration}"));
                resolved.migration.down(&manager).map_err(execution_error)?;
                self.repository.delete(migration)?;
                self.note(format!("Rolled back: {migration}"));
            }
        }
        Ok(())
    }
}

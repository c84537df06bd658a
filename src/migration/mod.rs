//! Migration system
//!
//! This module provides the infrastructure for database migrations, including:
//! - [`Migration`] trait definition and the [`SchemaManager`] it runs against
//! - The [`MigrationRepository`] recording which migrations ran, in which batch
//! - [`MigrationLocator`]s listing every known migration in order
//! - The [`MigrationResolver`] turning identifiers into runnable migrations
//! - The [`Migrator`] applying, rolling back and resetting batches
//!
//! # Example
//!
//! ```rust
//! use waypoint::migration::{
//!     DatabaseMigrationRepository, MigrateOptions, Migration, MigrationRepository,
//!     MigrationResolver, Migrator, SchemaManager, StaticLocator,
//! };
//! use waypoint::{LifeError, SqliteExecutor};
//! use sea_query::{ColumnDef, Table};
//!
//! pub struct CreateUsersTable;
//!
//! impl Migration for CreateUsersTable {
//!     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
//!         let table = Table::create()
//!             .table("users")
//!             .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
//!             .col(ColumnDef::new("email").string().not_null().unique_key())
//!             .to_owned();
//!         manager.create_table(table)
//!     }
//!
//!     fn down(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError> {
//!         manager.drop_table(Table::drop().table("users").to_owned())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::open_in_memory()?;
//! let repository = DatabaseMigrationRepository::new(&executor, "migrations")?;
//! repository.create_repository()?;
//!
//! let mut resolver = MigrationResolver::new();
//! resolver.register("app::CreateUsersTable", CreateUsersTable)?;
//!
//! let locator = StaticLocator::new(["app::CreateUsersTable"]);
//! let mut migrator = Migrator::new(repository, &executor, locator, resolver);
//! assert_eq!(migrator.run(MigrateOptions::default())?, vec!["app::CreateUsersTable"]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod locator;
pub mod lock;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod repository;
pub mod resolver;
pub mod schema_manager;
pub mod startup;
pub mod state_table;
pub mod status;

pub use error::MigrationError;
pub use locator::{discover_migrations, DirectoryLocator, MigrationFile, MigrationLocator, StaticLocator};
pub use lock::{MigrationLock, MigrationLockGuard};
pub use migration::Migration;
pub use migrator::{MigrateOptions, Migrator};
pub use record::MigrationRecord;
pub use repository::{DatabaseMigrationRepository, MigrationRepository};
pub use resolver::{legacy_key, MigrationResolver, Resolved};
pub use schema_manager::SchemaManager;
pub use startup::{startup_migrations, DEFAULT_LOCK_TIMEOUT_SECONDS};
pub use status::MigrationStatus;

// Re-export for convenience
pub use crate::LifeError;

//! # Waypoint
//!
//! Batch-based schema migrations: run pending migrations as one batch, roll
//! back the latest batch, or reset everything, with a pretend mode that only
//! reports the SQL it would execute.
//!
//! SQLite is built in; PostgreSQL is available behind the `postgres` feature.
//! See [`migration`] for the engine itself.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;

pub use config::MigrationConfig;
pub use connection::{connect, ConnectionError, SqliteExecutor};
pub use executor::{Cell, Dialect, Executor, LifeError, Row};

#[cfg(feature = "postgres")]
pub use connection::PostgresExecutor;

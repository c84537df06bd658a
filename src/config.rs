//! Migration settings loaded from `config/config.toml` or environment variables
//!
//! ```toml
//! [migrations]
//! database_url = "sqlite://waypoint.db"
//! table = "migrations"
//! lock_timeout_seconds = 60
//! ```
//!
//! Every key can be overridden with `WAYPOINT__MIGRATIONS__<KEY>`, e.g.
//! `WAYPOINT__MIGRATIONS__TABLE=schema_migrations`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "WAYPOINT";
const SECTION: &str = "migrations";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigrationConfig {
    /// Connection string passed to [`connect`](crate::connect)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Name of the repository table
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_lock_timeout_seconds")]
    pub lock_timeout_seconds: u64,
}

fn default_database_url() -> String {
    "waypoint.db".to_string()
}

fn default_table() -> String {
    crate::migration::state_table::DEFAULT_TABLE.to_string()
}

fn default_lock_timeout_seconds() -> u64 {
    crate::migration::DEFAULT_LOCK_TIMEOUT_SECONDS
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            table: default_table(),
            lock_timeout_seconds: default_lock_timeout_seconds(),
        }
    }
}

impl MigrationConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load the configuration from `path` (optional) plus env vars.
    ///
    /// A missing `[migrations]` section yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // The file exists but could not be parsed; retry with env only
                log::warn!(
                    "Failed to load config file {}, falling back to env. Error: {err}",
                    path.display()
                );
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<MigrationConfig>(SECTION) {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Migration configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    /// Name of the advisory lock table, derived from the repository table
    #[must_use]
    pub fn lock_table(&self) -> String {
        format!("{}_lock", self.table)
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }
}

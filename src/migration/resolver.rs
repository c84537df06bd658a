//! Migration registry: resolves identifiers to runnable migrations

use crate::migration::{Migration, MigrationError};
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized form used for the deprecated-name fallback
///
/// The last path segment (split on `::`, `\` or `/`), ASCII-lowercased, with
/// underscores removed, so `app::migrations::DeprecatedClassTable`,
/// `\App\DeprecatedClassTable` and `deprecated_class_table` share one key.
#[must_use]
pub fn legacy_key(identifier: &str) -> String {
    let segment = identifier
        .rsplit(|c: char| c == ':' || c == '\\' || c == '/')
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    segment
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A migration found by [`MigrationResolver::resolve`]
#[derive(Clone)]
pub struct Resolved {
    pub migration: Arc<dyn Migration>,
    /// Legacy key used, when the exact identifier was not registered
    pub legacy_key: Option<String>,
}

impl Resolved {
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.legacy_key.is_some()
    }
}

/// Registry mapping migration identifiers to their implementations
///
/// Lookups try the exact identifier first. Only if that fails is the
/// [`legacy_key`] of the identifier looked up among migrations registered with
/// [`register_legacy`](Self::register_legacy). The registry is an ordinary
/// value owned by the migrator; nothing is global.
///
/// ```
/// use waypoint::migration::{Migration, MigrationResolver, SchemaManager};
/// use waypoint::LifeError;
///
/// struct CreateUsersTable;
///
/// impl Migration for CreateUsersTable {
///     fn up(&self, _manager: &SchemaManager<'_>) -> Result<(), LifeError> { Ok(()) }
///     fn down(&self, _manager: &SchemaManager<'_>) -> Result<(), LifeError> { Ok(()) }
/// }
///
/// let mut resolver = MigrationResolver::new();
/// resolver.register("app::migrations::CreateUsersTable", CreateUsersTable)?;
/// assert!(resolver.is_registered("app::migrations::CreateUsersTable"));
/// # Ok::<(), waypoint::migration::MigrationError>(())
/// ```
#[derive(Default, Clone)]
pub struct MigrationResolver {
    migrations: HashMap<String, Arc<dyn Migration>>,
    legacy: HashMap<String, Arc<dyn Migration>>,
}

impl MigrationResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration under its fully-qualified identifier
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyRegistered` if the identifier is taken.
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        migration: impl Migration + 'static,
    ) -> Result<(), MigrationError> {
        let identifier = identifier.into();
        if self.migrations.contains_key(&identifier) {
            return Err(MigrationError::AlreadyRegistered(identifier));
        }
        self.migrations.insert(identifier, Arc::new(migration));
        Ok(())
    }

    /// Register a migration that is only reachable through its legacy name
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyRegistered` if another legacy migration
    /// normalizes to the same key.
    pub fn register_legacy(
        &mut self,
        legacy_name: &str,
        migration: impl Migration + 'static,
    ) -> Result<(), MigrationError> {
        let key = legacy_key(legacy_name);
        if key.is_empty() || self.legacy.contains_key(&key) {
            return Err(MigrationError::AlreadyRegistered(legacy_name.to_string()));
        }
        self.legacy.insert(key, Arc::new(migration));
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, identifier: &str) -> bool {
        self.migrations.contains_key(identifier)
    }

    /// Number of registered migrations (exact and legacy)
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len() + self.legacy.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve an identifier, falling back to its legacy key
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::BadClassName` if neither lookup succeeds.
    pub fn resolve(&self, identifier: &str) -> Result<Resolved, MigrationError> {
        if let Some(migration) = self.migrations.get(identifier) {
            return Ok(Resolved {
                migration: Arc::clone(migration),
                legacy_key: None,
            });
        }

        let key = legacy_key(identifier);
        match self.legacy.get(&key) {
            Some(migration) => Ok(Resolved {
                migration: Arc::clone(migration),
                legacy_key: Some(key),
            }),
            None => Err(MigrationError::BadClassName(identifier.to_string())),
        }
    }
}

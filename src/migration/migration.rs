//! Migration trait definition

use super::schema_manager::SchemaManager;
use crate::LifeError;

/// Trait that all migrations must implement
///
/// Each migration defines a struct implementing this trait with `up()` and `down()`
/// methods for applying and reversing its schema change. The identifier a migration
/// runs under is assigned when it is registered with a
/// [`MigrationResolver`](super::MigrationResolver).
///
/// Both methods receive a [`SchemaManager`]. During a pretend run the manager
/// records the statements instead of executing them, so the same code serves as
/// the read-only description of the change.
pub trait Migration {
    /// Apply the migration (forward migration)
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError>;

    /// Reverse the migration
    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), LifeError>;
}

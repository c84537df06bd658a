//! Migration status tracking

/// Migration status information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Applied migrations, in application order (from the repository)
    pub ran: Vec<String>,

    /// Pending migrations, in locator order
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Create a new `MigrationStatus`
    #[must_use]
    pub fn new(ran: Vec<String>, pending: Vec<String>) -> Self {
        Self { ran, pending }
    }

    /// Total number of migrations (applied + pending)
    #[must_use]
    pub fn total(&self) -> usize {
        self.ran.len() + self.pending.len()
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// The most recently applied migration
    #[must_use]
    pub fn last_applied(&self) -> Option<&str> {
        self.ran.last().map(String::as_str)
    }

    /// The next migration `run()` would apply
    #[must_use]
    pub fn next_pending(&self) -> Option<&str> {
        self.pending.first().map(String::as_str)
    }
}

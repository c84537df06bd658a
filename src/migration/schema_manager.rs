//! SchemaManager - Provides methods for schema operations in migrations

use crate::executor::{Dialect, Executor};
use crate::LifeError;
use sea_query::{
    ColumnDef, IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder,
    SchemaStatementBuilder, SqliteQueryBuilder, Table, TableAlterStatement, TableCreateStatement,
    TableDropStatement,
};
use std::cell::RefCell;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

/// SchemaManager provides methods for performing schema operations in migrations
///
/// This struct wraps an [`Executor`] and renders `sea-query` statements in the
/// executor's dialect. A manager built with [`SchemaManager::pretend`] never
/// executes mutating statements: it records the rendered SQL so the migrator can
/// report what a migration would do. Read-only calls such as
/// [`has_table`](Self::has_table) still reach the database in both modes, but
/// the raw [`executor`](Self::executor) is withheld.
pub struct SchemaManager<'a> {
    executor: &'a dyn Executor,
    captured: Option<RefCell<Vec<String>>>,
}

impl<'a> SchemaManager<'a> {
    /// Create a SchemaManager that executes statements
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self {
            executor,
            captured: None,
        }
    }

    /// Create a SchemaManager that records statements instead of executing them
    pub fn pretend(executor: &'a dyn Executor) -> Self {
        Self {
            executor,
            captured: Some(RefCell::new(Vec::new())),
        }
    }

    /// Whether mutating statements are being recorded rather than executed
    #[must_use]
    pub fn is_pretending(&self) -> bool {
        self.captured.is_some()
    }

    /// SQL dialect of the underlying executor
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// Drain the statements recorded so far (always empty outside pretend mode)
    pub fn take_statements(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .map(|captured| captured.take())
            .unwrap_or_default()
    }

    /// Render a schema statement for this manager's dialect
    ///
    /// `sea-query` panics on constructs a backend cannot express (e.g. expression
    /// index columns on SQLite); that is reported as `LifeError::QueryError`.
    fn render<S: SchemaStatementBuilder>(&self, statement: &S) -> Result<String, LifeError> {
        let dialect = self.dialect();
        panic::catch_unwind(AssertUnwindSafe(|| match dialect {
            Dialect::Sqlite => statement.build(SqliteQueryBuilder),
            Dialect::Postgres => statement.build(PostgresQueryBuilder),
        }))
        .map_err(|_| {
            LifeError::QueryError(format!(
                "statement cannot be rendered for the {dialect:?} dialect"
            ))
        })
    }

    fn run(&self, sql: String) -> Result<(), LifeError> {
        match &self.captured {
            Some(captured) => {
                captured.borrow_mut().push(sql);
                Ok(())
            }
            None => self.executor.execute(&sql).map(|_| ()),
        }
    }

    /// Check whether a table exists
    pub fn has_table(&self, table: &str) -> Result<bool, LifeError> {
        self.executor.has_table(table)
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// # use waypoint::migration::SchemaManager;
    /// # fn example(manager: &SchemaManager<'_>) -> Result<(), waypoint::LifeError> {
    /// use sea_query::{Table, ColumnDef};
    ///
    /// let table = Table::create()
    ///     .table("users")
    ///     .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
    ///     .col(ColumnDef::new("email").string().not_null().unique_key())
    ///     .to_owned();
    ///
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), LifeError> {
        self.run(self.render(&table)?)
    }

    /// Drop a table
    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), LifeError> {
        self.run(self.render(&table)?)
    }

    /// Alter a table
    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), LifeError> {
        self.run(self.render(&alter)?)
    }

    /// Create an index
    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), LifeError> {
        self.run(self.render(&index)?)
    }

    /// Drop an index
    pub fn drop_index(&self, index: IndexDropStatement) -> Result<(), LifeError> {
        self.run(self.render(&index)?)
    }

    /// Add a column to an existing table
    pub fn add_column<T: Display>(&self, table: T, column: ColumnDef) -> Result<(), LifeError> {
        let alter = Table::alter()
            .table(table.to_string())
            .add_column(column)
            .to_owned();
        self.alter_table(alter)
    }

    /// Drop a column from an existing table
    pub fn drop_column<T: Display>(&self, table: T, column: &str) -> Result<(), LifeError> {
        let alter = Table::alter()
            .table(table.to_string())
            .drop_column(column.to_string())
            .to_owned();
        self.alter_table(alter)
    }

    /// Rename a column in an existing table
    pub fn rename_column<T: Display>(
        &self,
        table: T,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), LifeError> {
        let alter = Table::alter()
            .table(table.to_string())
            .rename_column(old_name.to_string(), new_name.to_string())
            .to_owned();
        self.alter_table(alter)
    }

    /// Execute a single raw SQL statement
    ///
    /// # Example
    /// ```rust,no_run
    /// # use waypoint::migration::SchemaManager;
    /// # fn example(manager: &SchemaManager<'_>) -> Result<(), waypoint::LifeError> {
    /// manager.execute("CREATE INDEX idx_users_email ON users (email)")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute(&self, sql: &str) -> Result<(), LifeError> {
        self.run(sql.to_string())
    }

    /// The underlying executor, for work the builder methods do not cover
    ///
    /// `None` while pretending, so a dry run cannot reach the database
    /// except through the read-only helpers.
    #[must_use]
    pub fn executor(&self) -> Option<&dyn Executor> {
        if self.is_pretending() {
            None
        } else {
            Some(self.executor)
        }
    }
}

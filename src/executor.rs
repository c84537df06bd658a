//! `Executor` Module
//!
//! Provides the `Executor` trait that abstracts blocking database execution.
//!
//! Migrations, the migration repository and the lock all talk to storage through this
//! trait, so any backend that can run a SQL string and hand back rows can host them.
//! SQL is rendered with `sea-query`; the executor reports its [`Dialect`] so callers can
//! pick the matching builder.

use std::fmt;

/// `Executor` error type
#[derive(Debug)]
pub enum LifeError {
    /// SQLite error from `rusqlite`
    SqliteError(rusqlite::Error),
    /// `PostgreSQL` error from `postgres`
    #[cfg(feature = "postgres")]
    PostgresError(postgres::Error),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for LifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeError::SqliteError(e) => {
                write!(f, "SQLite error: {e}")
            }
            #[cfg(feature = "postgres")]
            LifeError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            LifeError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            LifeError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            LifeError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for LifeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifeError::SqliteError(e) => Some(e),
            #[cfg(feature = "postgres")]
            LifeError::PostgresError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for LifeError {
    fn from(err: rusqlite::Error) -> Self {
        LifeError::SqliteError(err)
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for LifeError {
    fn from(err: postgres::Error) -> Self {
        LifeError::PostgresError(err)
    }
}

/// SQL dialect spoken by an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Catalogue query counting tables named `table` in the current schema
    #[must_use]
    pub fn table_exists_sql(self, table: &str) -> String {
        let name = quote_literal(table);
        match self {
            Dialect::Sqlite => {
                format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = {name}")
            }
            Dialect::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = {name}"
            ),
        }
    }
}

/// Render a `sea-query` statement with the builder matching a [`Dialect`]
///
/// Works for schema statements (`Table::create()`, `Index::drop()`, ...) and for
/// query statements (`Query::insert()`, ...); values are inlined into the SQL.
#[macro_export]
macro_rules! render {
    ($dialect:expr, $stmt:expr) => {{
        #[allow(unused_imports)]
        use ::sea_query::{QueryStatementWriter as _, SchemaStatementBuilder as _};
        match $dialect {
            $crate::executor::Dialect::Sqlite => $stmt.to_string(::sea_query::SqliteQueryBuilder),
            $crate::executor::Dialect::Postgres => {
                $stmt.to_string(::sea_query::PostgresQueryBuilder)
            }
        }
    }};
}

/// Quote a string as a SQL literal, doubling embedded single quotes
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A single column value read back from storage
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Text(String),
}

/// A backend-neutral result row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Raw cell at `index`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if the row has no such column.
    pub fn cell(&self, index: usize) -> Result<&Cell, LifeError> {
        self.cells.get(index).ok_or_else(|| {
            LifeError::ParseError(format!(
                "column {index} out of range (row has {} columns)",
                self.cells.len()
            ))
        })
    }

    /// Integer value at `index`; `NULL` reads as `None`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if the column is missing or not an integer.
    pub fn get_i64(&self, index: usize) -> Result<Option<i64>, LifeError> {
        match self.cell(index)? {
            Cell::Null => Ok(None),
            Cell::Integer(v) => Ok(Some(*v)),
            Cell::Text(s) => Err(LifeError::ParseError(format!(
                "column {index}: expected integer, found text '{s}'"
            ))),
        }
    }

    /// Text value at `index`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if the column is missing, `NULL` or not text.
    pub fn get_string(&self, index: usize) -> Result<String, LifeError> {
        match self.cell(index)? {
            Cell::Text(s) => Ok(s.clone()),
            Cell::Null => Err(LifeError::ParseError(format!(
                "column {index}: expected text, found NULL"
            ))),
            Cell::Integer(v) => Err(LifeError::ParseError(format!(
                "column {index}: expected text, found integer {v}"
            ))),
        }
    }
}

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different implementations
/// (SQLite connection, PostgreSQL client, test doubles) to be used interchangeably.
/// All calls block until the backend answers.
///
/// # Examples
///
/// ```no_run
/// use waypoint::{Executor, LifeError, SqliteExecutor};
///
/// # fn main() -> Result<(), LifeError> {
/// let executor = SqliteExecutor::open_in_memory()?;
/// executor.execute("CREATE TABLE users (id INTEGER PRIMARY KEY)")?;
///
/// let rows = executor.query_all("SELECT COUNT(*) FROM users")?;
/// let count = rows[0].get_i64(0)?.unwrap_or(0);
/// # Ok(())
/// # }
/// ```
pub trait Executor {
    /// SQL dialect used to render statements for this executor
    fn dialect(&self) -> Dialect;

    /// Execute a single SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the statement fails.
    fn execute(&self, sql: &str) -> Result<u64, LifeError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails or a column cannot be converted.
    fn query_all(&self, sql: &str) -> Result<Vec<Row>, LifeError>;

    /// Execute a query expected to return exactly one row
    ///
    /// # Errors
    ///
    /// Returns `LifeError::QueryError` if zero or several rows come back.
    fn query_one(&self, sql: &str) -> Result<Row, LifeError> {
        let mut rows = self.query_all(sql)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            n => Err(LifeError::QueryError(format!(
                "expected exactly one row, got {n}"
            ))),
        }
    }

    /// Check whether a table exists
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the catalogue query fails.
    fn has_table(&self, table: &str) -> Result<bool, LifeError> {
        let row = self.query_one(&self.dialect().table_exists_sql(table))?;
        Ok(row.get_i64(0)?.unwrap_or(0) > 0)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&self, sql: &str) -> Result<u64, LifeError> {
        (**self).execute(sql)
    }

    fn query_all(&self, sql: &str) -> Result<Vec<Row>, LifeError> {
        (**self).query_all(sql)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&self, sql: &str) -> Result<u64, LifeError> {
        (**self).execute(sql)
    }

    fn query_all(&self, sql: &str) -> Result<Vec<Row>, LifeError> {
        (**self).query_all(sql)
    }
}

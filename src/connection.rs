//! Connection Module
//!
//! Opens executors from a connection string.
//!
//! - `:memory:` or `sqlite::memory:` opens a private in-memory SQLite database
//! - `sqlite://path/to/file.db` or a bare path opens (or creates) a SQLite file
//! - `postgres://...`, `postgresql://...` or key-value strings (`host=... user=...`)
//!   open a PostgreSQL client when the `postgres` feature is enabled

use crate::executor::{Cell, Dialect, Executor, LifeError, Row};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::fmt;
use std::path::Path;

/// Connection error type
#[derive(Debug)]
pub enum ConnectionError {
    /// Invalid connection string format
    InvalidConnectionString(String),
    /// The connection string names a backend this build does not include
    UnsupportedBackend(String),
    /// Error raised while opening the connection
    Backend(LifeError),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::InvalidConnectionString(s) => {
                write!(f, "Invalid connection string: {s}")
            }
            ConnectionError::UnsupportedBackend(s) => {
                write!(f, "Unsupported backend: {s}")
            }
            ConnectionError::Backend(e) => {
                write!(f, "Connection error: {e}")
            }
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<LifeError> for ConnectionError {
    fn from(err: LifeError) -> Self {
        ConnectionError::Backend(err)
    }
}

/// Backend selected by a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target<'a> {
    SqliteMemory,
    SqliteFile(&'a str),
    Postgres(&'a str),
}

fn classify(connection_string: &str) -> Result<Target<'_>, ConnectionError> {
    let s = connection_string.trim();
    if s.is_empty() {
        return Err(ConnectionError::InvalidConnectionString(
            "Connection string cannot be empty".to_string(),
        ));
    }

    if s == ":memory:" || s == "sqlite::memory:" {
        return Ok(Target::SqliteMemory);
    }

    if s.starts_with("postgresql://") || s.starts_with("postgres://") {
        if !s.contains('@') {
            return Err(ConnectionError::InvalidConnectionString(
                "URI format connection string must contain '@' to separate credentials from host"
                    .to_string(),
            ));
        }
        return Ok(Target::Postgres(s));
    }

    if let Some(path) = s.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(ConnectionError::InvalidConnectionString(
                "sqlite:// connection string is missing a file path".to_string(),
            ));
        }
        return Ok(Target::SqliteFile(path));
    }

    if s.contains("://") {
        return Err(ConnectionError::UnsupportedBackend(s.to_string()));
    }

    // Key-value format (`host=localhost user=postgres`)
    if s.contains('=') {
        return Ok(Target::Postgres(s));
    }

    Ok(Target::SqliteFile(s))
}

/// Open an executor for the given connection string
///
/// # Errors
///
/// Returns `ConnectionError` if the string is malformed, names a backend that is not
/// compiled in, or the backend refuses the connection.
///
/// # Examples
///
/// ```no_run
/// use waypoint::connection::connect;
///
/// let executor = connect("sqlite://var/app.db")?;
/// assert!(!executor.has_table("users")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn connect(connection_string: &str) -> Result<Box<dyn Executor>, ConnectionError> {
    match classify(connection_string)? {
        Target::SqliteMemory => Ok(Box::new(SqliteExecutor::open_in_memory()?)),
        Target::SqliteFile(path) => Ok(Box::new(SqliteExecutor::open(path)?)),
        #[cfg(feature = "postgres")]
        Target::Postgres(url) => Ok(Box::new(PostgresExecutor::connect(url)?)),
        #[cfg(not(feature = "postgres"))]
        Target::Postgres(_) => Err(ConnectionError::UnsupportedBackend(
            "PostgreSQL support requires the `postgres` feature".to_string(),
        )),
    }
}

/// `Executor` backed by a `rusqlite::Connection`
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Wrap an existing connection
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) a database file
    ///
    /// # Errors
    ///
    /// Returns `LifeError::SqliteError` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LifeError> {
        Ok(Self::new(Connection::open(path)?))
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns `LifeError::SqliteError` if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, LifeError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str) -> Result<u64, LifeError> {
        let affected = self.conn.execute(sql, [])?;
        Ok(affected as u64)
    }

    fn query_all(&self, sql: &str) -> Result<Vec<Row>, LifeError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns);
            for index in 0..columns {
                cells.push(match row.get_ref(index)? {
                    ValueRef::Null => Cell::Null,
                    ValueRef::Integer(v) => Cell::Integer(v),
                    ValueRef::Real(v) => Cell::Text(v.to_string()),
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                        Cell::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                });
            }
            out.push(Row::new(cells));
        }
        Ok(out)
    }
}

#[cfg(feature = "postgres")]
pub use self::pg::PostgresExecutor;

#[cfg(feature = "postgres")]
mod pg {
    use crate::executor::{Cell, Dialect, Executor, LifeError, Row};
    use postgres::types::Type;
    use postgres::{Client, NoTls};
    use std::cell::RefCell;

    /// `Executor` backed by a blocking `postgres::Client`
    pub struct PostgresExecutor {
        client: RefCell<Client>,
    }

    impl PostgresExecutor {
        /// Wrap an existing client
        pub fn new(client: Client) -> Self {
            Self {
                client: RefCell::new(client),
            }
        }

        /// Connect without TLS
        ///
        /// # Errors
        ///
        /// Returns `LifeError::PostgresError` if the server cannot be reached.
        pub fn connect(url: &str) -> Result<Self, LifeError> {
            Ok(Self::new(Client::connect(url, NoTls)?))
        }

        /// Consume the executor and return the underlying client
        pub fn into_client(self) -> Client {
            self.client.into_inner()
        }
    }

    fn to_cell(row: &postgres::Row, index: usize, ty: &Type) -> Result<Cell, LifeError> {
        let cell = if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(index)?
                .map_or(Cell::Null, Cell::Integer)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(index)?
                .map_or(Cell::Null, |v| Cell::Integer(i64::from(v)))
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(index)?
                .map_or(Cell::Null, |v| Cell::Integer(i64::from(v)))
        } else if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(index)?
                .map_or(Cell::Null, |v| Cell::Integer(i64::from(v)))
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
        {
            row.try_get::<_, Option<String>>(index)?
                .map_or(Cell::Null, Cell::Text)
        } else {
            return Err(LifeError::ParseError(format!(
                "column {index}: unsupported PostgreSQL type {ty}"
            )));
        };
        Ok(cell)
    }

    impl Executor for PostgresExecutor {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn execute(&self, sql: &str) -> Result<u64, LifeError> {
            Ok(self.client.borrow_mut().execute(sql, &[])?)
        }

        fn query_all(&self, sql: &str) -> Result<Vec<Row>, LifeError> {
            let rows = self.client.borrow_mut().query(sql, &[])?;
            rows.iter()
                .map(|row| {
                    row.columns()
                        .iter()
                        .enumerate()
                        .map(|(index, column)| to_cell(row, index, column.type_()))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Row::new)
                })
                .collect()
        }
    }
}

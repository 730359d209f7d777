use crate::error::{Error, Result};
use crate::sqlite::SqliteConnection;
use rusqlite::Connection;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Options for opening a [`SqliteConnection`].
///
/// Parsed from a URI of the form `sqlite::memory:`, `sqlite://path/to/db` or `sqlite:path`.
///
/// ```
/// use dbrunner::sqlite::SqliteConnectOptions;
/// use std::time::Duration;
///
/// let options: SqliteConnectOptions = "sqlite://data/app.db".parse()?;
/// let options = options.busy_timeout(Duration::from_secs(5));
/// assert_eq!(options.get_filename().unwrap().to_str(), Some("data/app.db"));
/// # Ok::<(), dbrunner::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConnectOptions {
    filename: Option<PathBuf>,
    busy_timeout: Option<Duration>,
}

impl SqliteConnectOptions {
    /// Options for a private, in-memory database.
    pub fn in_memory() -> Self {
        Self { filename: None, busy_timeout: None }
    }

    /// Options for the database file at `filename`, created if missing.
    pub fn filename(filename: impl Into<PathBuf>) -> Self {
        Self { filename: Some(filename.into()), busy_timeout: None }
    }

    /// How long a statement waits on a locked database before failing.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// The database file, or `None` for an in-memory database.
    pub fn get_filename(&self) -> Option<&std::path::Path> {
        self.filename.as_deref()
    }

    /// Open a new connection.
    pub fn connect(&self) -> Result<SqliteConnection> {
        let conn = match &self.filename {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }

        tracing::debug!(filename = ?self.filename, "opened sqlite connection");

        Ok(SqliteConnection::from(conn))
    }
}

impl FromStr for SqliteConnectOptions {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("sqlite:")
            .ok_or_else(|| Error::Configuration(format!("unsupported database URI: {}", uri)))?;

        let rest = rest.strip_prefix("//").unwrap_or(rest);

        match rest {
            ":memory:" | "memory:" => Ok(Self::in_memory()),
            "" => Err(Error::Configuration(format!("missing database path in URI: {}", uri))),
            path => Ok(Self::filename(path)),
        }
    }
}

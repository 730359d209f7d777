use crate::error::{Error, Result};
use crate::runner::SyncConnection;
use crate::sqlite::SqliteCursor;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// A SQLite database connection.
///
/// Clones share the same underlying connection, which is handy for inspecting what a runner
/// did. Give each runner a connection of its own: a runner refuses to start an interaction
/// while a transaction is open on its connection, so runners sharing one fail rather than
/// interleave.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConnection {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from(Connection::open(path)?))
    }

    /// Open a private, in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from(Connection::open_in_memory()?))
    }

    /// Run one or more `;`-separated statements outside of any runner.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Returns `true` while a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.lock().is_autocommit()
    }

    /// Run `f` with exclusive access to the underlying `rusqlite` connection.
    pub fn with_raw<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
        f(&mut self.conn.lock())
    }
}

impl From<Connection> for SqliteConnection {
    fn from(conn: Connection) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)) }
    }
}

impl SyncConnection for SqliteConnection {
    type Cursor = SqliteCursor;

    fn cursor(&self) -> Result<SqliteCursor> {
        let conn = self.conn.lock();

        if !conn.is_autocommit() {
            return Err(Error::TransactionInProgress);
        }

        conn.execute_batch("BEGIN")?;

        Ok(SqliteCursor::new(Arc::clone(&self.conn)))
    }

    fn commit(&self) -> Result<()> {
        let conn = self.conn.lock();

        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }

        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let conn = self.conn.lock();

        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }

        Ok(())
    }
}

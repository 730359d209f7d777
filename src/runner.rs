//! Transactional runners: run a unit of work against a fresh cursor, committing on success and
//! rolling back on failure.

use crate::cursor::{BlockingCursor, Cursor, SyncCursor};
use crate::error::Result;
use crate::value::{Row, Value};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::lock::Mutex;
use std::fmt::{self, Debug, Formatter};

/// Executes interactions, each inside its own transaction.
///
/// An interaction is a closure handed a cursor; whatever it resolves with is what the runner
/// resolves with. If it fails, the transaction is rolled back and the interaction's error is
/// returned unchanged.
///
/// ```
/// use dbrunner::{params, BlockingRunner, Cursor, Runner};
/// use dbrunner::sqlite::SqliteConnection;
/// use futures::FutureExt;
///
/// # futures::executor::block_on(async {
/// let runner = BlockingRunner::new(SqliteConnection::open_in_memory()?);
/// runner.run_operation("create table foo (name text)", params![]).await?;
///
/// let id = runner
///     .run_interaction(|cursor| {
///         async move {
///             cursor.execute("insert into foo (name) values (?)", &params!["name1"]).await?;
///             cursor.last_row_id().await
///         }
///         .boxed()
///     })
///     .await?;
/// assert_eq!(id, Some(1));
/// # Ok::<(), dbrunner::Error>(())
/// # }).unwrap();
/// ```
pub trait Runner: Send + Sync {
    type Cursor: Cursor;

    /// Run `interaction` against a fresh cursor inside a transaction.
    fn run_interaction<'r, T, F>(&'r self, interaction: F) -> BoxFuture<'r, Result<T>>
    where
        T: Send + 'r,
        F: for<'c> FnOnce(&'c mut Self::Cursor) -> BoxFuture<'c, Result<T>> + Send + 'r;

    /// Execute `sql` and return all of its rows, in result order.
    fn run_query<'r>(&'r self, sql: &str, params: Vec<Value>) -> BoxFuture<'r, Result<Vec<Row>>> {
        let sql = sql.to_owned();

        self.run_interaction(move |cursor| {
            async move {
                cursor.execute(&sql, &params).await?;
                cursor.fetchall().await
            }
            .boxed()
        })
    }

    /// Execute `sql`, discarding any result.
    fn run_operation<'r>(&'r self, sql: &str, params: Vec<Value>) -> BoxFuture<'r, Result<()>> {
        let sql = sql.to_owned();

        self.run_interaction(move |cursor| {
            async move {
                cursor.execute(&sql, &params).await?;
                Ok(())
            }
            .boxed()
        })
    }
}

/// A synchronous database connection, as driven by [`BlockingRunner`].
pub trait SyncConnection: Send + Sync + 'static {
    type Cursor: SyncCursor;

    /// Obtain a new cursor on this connection, starting the transaction an interaction runs in.
    fn cursor(&self) -> Result<Self::Cursor>;

    fn commit(&self) -> Result<()>;

    /// Called after a failed interaction, and after a failed `commit`.
    fn rollback(&self) -> Result<()>;
}

type CursorFactory<C, K> = Box<dyn Fn(<C as SyncConnection>::Cursor) -> K + Send + Sync + 'static>;

/// A [`Runner`] over one synchronous connection.
///
/// The cursor handed to interactions is built from the connection's own cursor by a cursor
/// factory chosen at construction; by default the driver cursor is wrapped in a
/// [`BlockingCursor`]. Interactions on the same runner never overlap.
pub struct BlockingRunner<C, K = BlockingCursor<<C as SyncConnection>::Cursor>>
where
    C: SyncConnection,
{
    conn: C,
    cursor_factory: CursorFactory<C, K>,
    // held for the whole of an interaction, commit or rollback included
    busy: Mutex<()>,
}

impl<C: SyncConnection> BlockingRunner<C> {
    pub fn new(conn: C) -> Self {
        Self::with_cursor_factory(conn, BlockingCursor::new)
    }
}

impl<C, K> BlockingRunner<C, K>
where
    C: SyncConnection,
    K: Cursor,
{
    /// Create a runner whose interactions receive cursors built by `cursor_factory`.
    pub fn with_cursor_factory<F>(conn: C, cursor_factory: F) -> Self
    where
        F: Fn(C::Cursor) -> K + Send + Sync + 'static,
    {
        Self { conn, cursor_factory: Box::new(cursor_factory), busy: Mutex::new(()) }
    }

    /// The connection this runner drives.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }
}

impl<C, K> Runner for BlockingRunner<C, K>
where
    C: SyncConnection,
    K: Cursor,
{
    type Cursor = K;

    fn run_interaction<'r, T, F>(&'r self, interaction: F) -> BoxFuture<'r, Result<T>>
    where
        T: Send + 'r,
        F: for<'c> FnOnce(&'c mut K) -> BoxFuture<'c, Result<T>> + Send + 'r,
    {
        async move {
            let _busy = self.busy.lock().await;

            let raw = self.conn.cursor()?;
            let tx = Transaction::begin(&self.conn);
            let mut cursor = (self.cursor_factory)(raw);
            let outcome = interaction(&mut cursor).await;
            drop(cursor);

            match outcome {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }

                Err(error) => {
                    tracing::debug!(%error, "interaction failed; rolling back");
                    tx.rollback();
                    Err(error)
                }
            }
        }
        .boxed()
    }
}

/// Ends the transaction of one interaction exactly once: by commit, by rollback, or by
/// rollback on drop when the interaction was abandoned. A commit that fails is followed by a
/// rollback.
struct Transaction<'a, C: SyncConnection> {
    conn: &'a C,
    open: bool,
}

impl<'a, C: SyncConnection> Transaction<'a, C> {
    fn begin(conn: &'a C) -> Self {
        Self { conn, open: true }
    }

    fn commit(mut self) -> Result<()> {
        self.open = false;

        if let Err(error) = self.conn.commit() {
            // nothing of a failed commit may leak into the next interaction
            tracing::debug!(%error, "commit failed; rolling back");
            self.rollback_quietly();
            return Err(error);
        }

        tracing::debug!("interaction committed");
        Ok(())
    }

    fn rollback(mut self) {
        self.open = false;
        self.rollback_quietly();
    }

    fn rollback_quietly(&self) {
        // never replaces the error that caused the rollback
        if let Err(error) = self.conn.rollback() {
            tracing::warn!(%error, "rollback failed");
        }
    }
}

impl<C: SyncConnection> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!("interaction abandoned; rolling back");
            self.rollback_quietly();
        }
    }
}

impl<C, K> Debug for BlockingRunner<C, K>
where
    C: SyncConnection + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRunner").field("conn", &self.conn).finish()
    }
}

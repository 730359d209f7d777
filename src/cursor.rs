//! The async cursor contract and the adapter that lets a synchronous driver cursor satisfy it.

use crate::error::Result;
use crate::value::{Row, Value};
use futures_util::future::{self, BoxFuture, FutureExt};

/// A handle used within an interaction to execute statements and fetch rows.
///
/// Parameters are passed through to the driver unchanged, so the placeholder syntax is whatever
/// the driver understands (`?` for SQLite).
pub trait Cursor: Send {
    /// Execute a statement, resolving with the cursor itself so calls can be chained.
    fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Value],
    ) -> BoxFuture<'c, Result<&'c mut Self>>;

    /// Fetch the next row of the last statement, or `None` once the rows are exhausted.
    fn fetchone(&mut self) -> BoxFuture<'_, Result<Option<Row>>>;

    /// Fetch every remaining row of the last statement, in result order.
    fn fetchall(&mut self) -> BoxFuture<'_, Result<Vec<Row>>>;

    /// The row id generated by the most recent insert, if the driver exposes one.
    fn last_row_id(&mut self) -> BoxFuture<'_, Result<Option<i64>>>;
}

/// A cursor as exposed by a synchronous database driver.
pub trait SyncCursor: Send + 'static {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    fn fetchone(&mut self) -> Result<Option<Row>>;

    fn fetchall(&mut self) -> Result<Vec<Row>>;

    /// Drivers without a notion of generated row ids keep the default.
    fn last_row_id(&self) -> Result<Option<i64>> {
        Ok(None)
    }
}

/// Adapts a [`SyncCursor`] to the [`Cursor`] contract.
///
/// Every call runs the driver operation immediately and returns an already-resolved future.
#[derive(Debug)]
pub struct BlockingCursor<S> {
    inner: S,
}

impl<S: SyncCursor> BlockingCursor<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SyncCursor> Cursor for BlockingCursor<S> {
    fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Value],
    ) -> BoxFuture<'c, Result<&'c mut Self>> {
        let res = self.inner.execute(sql, params);
        future::ready(res.map(|()| self)).boxed()
    }

    fn fetchone(&mut self) -> BoxFuture<'_, Result<Option<Row>>> {
        future::ready(self.inner.fetchone()).boxed()
    }

    fn fetchall(&mut self) -> BoxFuture<'_, Result<Vec<Row>>> {
        future::ready(self.inner.fetchall()).boxed()
    }

    fn last_row_id(&mut self) -> BoxFuture<'_, Result<Option<i64>>> {
        future::ready(self.inner.last_row_id()).boxed()
    }
}

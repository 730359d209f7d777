use crate::error::{Error, Result};
use crate::pool::RunnerPool;
use crate::runner::Runner;
use std::fmt::{self, Debug, Formatter};

#[cfg(feature = "sqlite")]
use crate::{
    runner::BlockingRunner,
    sqlite::{SqliteConnectOptions, SqliteConnection},
};

/// Configuration for wiring up a [`RunnerPool`].
///
/// ```
/// use dbrunner::pool::PoolOptions;
///
/// let pool = PoolOptions::new().connections(2).build("sqlite::memory:")?;
/// assert_eq!(pool.size(), 2);
/// # Ok::<(), dbrunner::Error>(())
/// ```
#[derive(Clone)]
pub struct PoolOptions {
    pub(crate) connections: u32,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    /// Create a new `PoolOptions` with a single connection.
    pub fn new() -> Self {
        Self { connections: 1 }
    }

    /// Set the number of runners the pool is built with.
    ///
    /// Each runner owns its own connection.
    pub fn connections(mut self, connections: u32) -> Self {
        self.connections = connections;
        self
    }

    /// Creates a new pool, opening every runner with `connect`.
    ///
    /// Fails with the first error `connect` returns; runners opened before that are dropped.
    pub fn build_with<R, F>(self, mut connect: F) -> Result<RunnerPool<R>>
    where
        R: Runner + 'static,
        F: FnMut() -> Result<R>,
    {
        if self.connections == 0 {
            return Err(Error::Configuration("a pool needs at least one connection".into()));
        }

        let runners = (0..self.connections).map(|_| connect()).collect::<Result<Vec<_>>>()?;

        let pool = RunnerPool::new();
        pool.add_all(runners);

        tracing::debug!(connections = self.connections, "runner pool ready");

        Ok(pool)
    }
}

#[cfg(feature = "sqlite")]
impl PoolOptions {
    /// Creates a new pool of SQLite runners from a connection URI.
    ///
    /// Returns an error if the URI fails to parse or a connection fails to open. Every
    /// connection to `sqlite::memory:` is a separate, private database.
    pub fn build(self, uri: &str) -> Result<RunnerPool<BlockingRunner<SqliteConnection>>> {
        self.build_with_options(uri.parse()?)
    }

    /// Creates a new pool of SQLite runners from parsed connection options.
    pub fn build_with_options(
        self,
        options: SqliteConnectOptions,
    ) -> Result<RunnerPool<BlockingRunner<SqliteConnection>>> {
        self.build_with(|| Ok(BlockingRunner::new(options.connect()?)))
    }
}

impl Debug for PoolOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions").field("connections", &self.connections).finish()
    }
}

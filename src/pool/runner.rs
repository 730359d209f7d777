use crate::error::Result;
use crate::pool::Pool;
use crate::runner::Runner;
use futures_util::future::{BoxFuture, FutureExt, TryFutureExt};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A pooled runner, compared by identity rather than by value.
struct Member<R>(Arc<R>);

impl<R> Clone for Member<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R> PartialEq for Member<R> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A [`Runner`] that spreads interactions over a pool of runners.
///
/// Each call checks a runner out, forwards to it, and checks it back in before resolving,
/// whether the interaction succeeded or not.
pub struct RunnerPool<R> {
    pool: Pool<Member<R>>,
}

impl<R> RunnerPool<R>
where
    R: Runner + 'static,
{
    /// Create a pool with no runners.
    ///
    /// Interactions wait until a runner is [added](Self::add).
    pub fn new() -> Self {
        Self { pool: Pool::new() }
    }

    /// Add a runner to the pool.
    ///
    /// Returns the handle under which the pool knows the runner; pass it to
    /// [`remove`](Self::remove) to take the runner out again.
    pub fn add(&self, runner: impl Into<Arc<R>>) -> Arc<R> {
        let runner = runner.into();
        self.pool.add(Member(Arc::clone(&runner)));
        runner
    }

    /// Add several runners at once.
    pub fn add_all<I>(&self, runners: I) -> Vec<Arc<R>>
    where
        I: IntoIterator<Item = R>,
    {
        runners.into_iter().map(|runner| self.add(runner)).collect()
    }

    /// Take a runner out of the pool, waiting for its current interaction (if any) to finish.
    ///
    /// Closing the underlying connection is left to the caller.
    pub fn remove(&self, runner: &Arc<R>) -> BoxFuture<'static, Result<Arc<R>>> {
        self.pool.remove(&Member(Arc::clone(runner))).map_ok(|member| member.0).boxed()
    }

    /// Number of runners in the pool.
    pub fn size(&self) -> usize {
        self.pool.size()
    }

    /// Number of runners not running an interaction.
    pub fn num_idle(&self) -> usize {
        self.pool.num_available()
    }

    /// Number of interactions waiting for a runner.
    pub fn num_waiting(&self) -> usize {
        self.pool.num_waiting()
    }
}

impl<R> Runner for RunnerPool<R>
where
    R: Runner + 'static,
{
    type Cursor = R::Cursor;

    fn run_interaction<'r, T, F>(&'r self, interaction: F) -> BoxFuture<'r, Result<T>>
    where
        T: Send + 'r,
        F: for<'c> FnOnce(&'c mut R::Cursor) -> BoxFuture<'c, Result<T>> + Send + 'r,
    {
        async move {
            // checked back in on drop if this future is abandoned mid-interaction
            let runner = self.pool.checkout().await?;
            tracing::trace!("runner checked out");

            let result = runner.0.run_interaction(interaction).await;

            if let Err(error) = runner.release() {
                tracing::warn!(%error, "failed to check runner back in");
            }

            result
        }
        .boxed()
    }
}

impl<R> Default for RunnerPool<R>
where
    R: Runner + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for RunnerPool<R> {
    fn clone(&self) -> Self {
        Self { pool: self.pool.clone() }
    }
}

impl<R> Debug for RunnerPool<R>
where
    R: Runner + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerPool")
            .field("size", &self.size())
            .field("idle", &self.num_idle())
            .field("waiting", &self.num_waiting())
            .finish()
    }
}


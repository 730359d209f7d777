//! A fair pool of interchangeable resources, and a pool of [`Runner`](crate::Runner)s built on it.
//!
//! Resources are created and destroyed by the owner of the pool; the pool only tracks which
//! ones are free and who is waiting for them:
//!
//! * [`Pool::get`] checks a resource out, waiting in line (first come, first served) if none is free.
//! * [`Pool::done`] checks it back in, handing it straight to the longest waiting caller.
//! * [`Pool::remove`] takes a resource out of rotation. A resource that is in use is removed
//!   once it is checked back in, without disturbing the work already running on it.
//!
//! [`Pool`] identifies resources by `PartialEq`. [`RunnerPool`] identifies its runners by
//! pointer, so two runners over equal connections are still two runners.
//!
//! ```
//! use dbrunner::pool::Pool;
//!
//! # futures::executor::block_on(async {
//! let pool = Pool::new();
//! pool.add("foo");
//!
//! let foo = pool.get().await?;
//! let pending = pool.get();
//! assert!(!pending.is_ready());
//!
//! pool.done(foo)?;
//! assert_eq!(pending.await?, "foo");
//! # Ok::<(), dbrunner::Error>(())
//! # }).unwrap();
//! ```

use crate::error::Error;
use crate::pool::shared::{Request, SharedPool};
use futures_util::future::{self, BoxFuture, FutureExt};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

pub use self::checkout::{Acquire, Checkout};
pub use self::options::PoolOptions;
pub use self::runner::RunnerPool;

mod checkout;
mod options;
mod runner;
mod shared;
mod wait_list;

/// A pool of resources with single-holder checkout.
///
/// Resources are compared with `PartialEq`; two resources that compare equal are the same
/// resource as far as the pool is concerned. Resources that must be told apart by identity
/// rather than by value belong in an `Arc` behind an `Arc::ptr_eq` comparison, which is how
/// [`RunnerPool`] holds its runners. Cloning a `Pool` yields another handle to the same pool.
pub struct Pool<R>
where
    R: Clone + PartialEq,
{
    shared: Arc<SharedPool<R>>,
}

impl<R> Pool<R>
where
    R: Clone + PartialEq + Send + 'static,
{
    /// Create an empty pool.
    pub fn new() -> Self {
        Self { shared: Arc::new(SharedPool::new()) }
    }

    /// Make `resource` available, serving the longest waiting [`get`](Self::get) first.
    ///
    /// Adding a resource the pool already knows about does nothing.
    pub fn add(&self, resource: R) {
        if self.shared.add(resource) {
            tracing::debug!("resource added to pool");
        } else {
            tracing::warn!("resource is already in the pool; ignoring");
        }
    }

    /// Check out a resource.
    ///
    /// Completes immediately if a resource is available, else once one is added or checked
    /// back in. Waiting requests are served in the order they were made.
    pub fn get(&self) -> Acquire<R> {
        let request = self.shared.acquire();
        Acquire::new(&self.shared, request)
    }

    /// Check out a resource only if one is available right now.
    pub fn try_get(&self) -> Option<R> {
        self.shared.try_acquire()
    }

    /// Check out a resource wrapped in a guard that checks it back in on drop.
    pub fn checkout(&self) -> impl std::future::Future<Output = Result<Checkout<R>, Error>> {
        let shared = Arc::clone(&self.shared);
        self.get().map(move |res| res.map(|resource| Checkout::new(shared, resource)))
    }

    /// Check a resource back in.
    ///
    /// If removal of `resource` was requested while it was checked out, every such request is
    /// resolved now and the resource leaves the pool. Otherwise it goes to the longest waiting
    /// [`get`](Self::get), or back to the available set.
    ///
    /// Returns [`Error::NotCheckedOut`] if `resource` is not checked out.
    pub fn done(&self, resource: R) -> Result<(), Error> {
        self.shared.done(resource).map_err(|error| {
            tracing::warn!(%error, "checkin of a resource that was not checked out");
            error
        })
    }

    /// Take `resource` out of the pool.
    ///
    /// An available resource is removed immediately. A checked-out resource is removed when it
    /// is next checked in; all removals requested until then resolve together.
    ///
    /// Resolves with [`Error::UnknownResource`] if the pool does not know `resource`.
    pub fn remove(&self, resource: &R) -> BoxFuture<'static, Result<R, Error>> {
        match self.shared.remove(resource) {
            Ok(Request::Ready(resource)) => future::ready(Ok(resource)).boxed(),
            Ok(Request::Waiting(rx)) => rx.map(|res| res.map_err(|_| Error::PoolClosed)).boxed(),
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    /// Number of resources known to the pool.
    pub fn size(&self) -> usize {
        self.num_available() + self.num_checked_out()
    }

    /// Number of resources not currently checked out.
    pub fn num_available(&self) -> usize {
        self.shared.num_available()
    }

    /// Number of resources currently checked out.
    pub fn num_checked_out(&self) -> usize {
        self.shared.num_checked_out()
    }

    /// Number of [`get`](Self::get) requests waiting for a resource.
    pub fn num_waiting(&self) -> usize {
        self.shared.num_waiting()
    }

    /// Number of checked-out resources with a removal pending.
    pub fn num_removing(&self) -> usize {
        self.shared.num_removing()
    }
}

impl<R> Default for Pool<R>
where
    R: Clone + PartialEq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a new [Pool] tied to the same shared state.
impl<R> Clone for Pool<R>
where
    R: Clone + PartialEq,
{
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<R> Debug for Pool<R>
where
    R: Clone + PartialEq + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("available", &self.num_available())
            .field("checked_out", &self.num_checked_out())
            .field("waiting", &self.num_waiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn get_then_done_serves_pending_request() {
        let pool = Pool::new();
        pool.add("foo");
        pool.add("bar");

        let a = block_on(pool.get()).unwrap();
        let b = block_on(pool.get()).unwrap();
        assert_ne!(a, b);

        let mut c = pool.get();
        assert!((&mut c).now_or_never().is_none(), "nothing should be available");

        pool.done(a).unwrap();
        assert_eq!(c.now_or_never().unwrap().unwrap(), a);
    }

    #[test]
    fn add_fulfills_pending_request() {
        let pool = Pool::new();

        let mut pending = pool.get();
        assert!((&mut pending).now_or_never().is_none());

        pool.add("foo");
        assert_eq!(pending.now_or_never().unwrap().unwrap(), "foo");
        assert_eq!(pool.num_checked_out(), 1);
        assert_eq!(pool.num_available(), 0);
    }

    #[test]
    fn remove_idle_is_immediate() {
        let pool = Pool::new();
        pool.add("foo");
        pool.add("bar");

        let removed = pool.remove(&"foo").now_or_never().unwrap().unwrap();
        assert_eq!(removed, "foo");

        let a = block_on(pool.get()).unwrap();
        assert_eq!(a, "bar");

        let mut b = pool.get();
        assert!((&mut b).now_or_never().is_none());
        pool.done(a).unwrap();
        assert_eq!(b.now_or_never().unwrap().unwrap(), "bar");
    }

    #[test]
    fn remove_in_use_waits_for_checkin() {
        let pool = Pool::new();
        pool.add("foo");
        let a = block_on(pool.get()).unwrap();

        let mut removal = pool.remove(&"foo");
        assert!((&mut removal).now_or_never().is_none(), "still in use");
        assert_eq!(pool.num_removing(), 1);

        pool.done(a).unwrap();
        assert_eq!(removal.now_or_never().unwrap().unwrap(), "foo");
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn remove_twice_resolves_both() {
        let pool = Pool::new();
        pool.add("foo");
        let a = block_on(pool.get()).unwrap();

        let b = pool.remove(&"foo");
        let c = pool.remove(&"foo");
        pool.done(a).unwrap();

        assert_eq!(b.now_or_never().unwrap().unwrap(), "foo");
        assert_eq!(c.now_or_never().unwrap().unwrap(), "foo");
    }

    #[test]
    fn pending_removal_is_not_handed_to_waiting_get() {
        let pool = Pool::new();
        pool.add("foo");
        let a = block_on(pool.get()).unwrap();

        let mut waiting = pool.get();
        let removal = pool.remove(&"foo");
        pool.done(a).unwrap();

        assert_eq!(removal.now_or_never().unwrap().unwrap(), "foo");
        assert!((&mut waiting).now_or_never().is_none());

        pool.add("bar");
        assert_eq!(waiting.now_or_never().unwrap().unwrap(), "bar");
    }

    #[test]
    fn remove_unknown_resource_fails() {
        let pool = Pool::new();
        pool.add("foo");

        let res = pool.remove(&"nope").now_or_never().unwrap();
        assert!(matches!(res, Err(Error::UnknownResource)));

        let removed = block_on(pool.remove(&"foo")).unwrap();
        let again = pool.remove(&removed).now_or_never().unwrap();
        assert!(matches!(again, Err(Error::UnknownResource)));
    }

    #[test]
    fn done_of_idle_resource_is_rejected() {
        let pool = Pool::new();
        pool.add("foo");

        assert!(matches!(pool.done("foo"), Err(Error::NotCheckedOut)));
        assert_eq!(pool.num_available(), 1);
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let pool = Pool::new();
        pool.add("foo");
        pool.add("foo");

        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn dropped_waiter_is_skipped() {
        let pool = Pool::new();
        pool.add("foo");
        let a = block_on(pool.get()).unwrap();

        let first = pool.get();
        let mut second = pool.get();
        assert_eq!(pool.num_waiting(), 2);
        drop(first);
        assert_eq!(pool.num_waiting(), 1);

        pool.done(a).unwrap();
        assert_eq!(second.now_or_never().unwrap().unwrap(), "foo");
    }

    #[test]
    fn dropping_an_assigned_request_returns_the_resource() {
        let pool = Pool::new();
        pool.add("foo");

        let ready = pool.get();
        assert!(ready.is_ready());
        drop(ready);
        assert_eq!(pool.num_available(), 1);

        let a = pool.try_get().unwrap();
        let waiting = pool.get();
        pool.done(a).unwrap();
        // handed to `waiting`, which never collects it
        assert_eq!(pool.num_checked_out(), 1);
        drop(waiting);
        assert_eq!(pool.num_available(), 1);
    }

    #[test]
    fn abandoned_request_with_a_stale_resource_leaves_the_pool_intact() {
        let pool = Pool::new();
        pool.add("foo");
        let a = pool.try_get().unwrap();

        let waiting = pool.get();
        pool.done(a).unwrap();
        // checked in behind the back of `waiting`, which was handed "foo"
        pool.done("foo").unwrap();
        assert_eq!(pool.num_available(), 1);

        // the abandoned request's own checkin is rejected and only logged
        drop(waiting);
        assert_eq!(pool.num_available(), 1);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn abandoned_removals_fall_back_to_checkin() {
        let pool = Pool::new();
        pool.add("foo");
        let a = pool.try_get().unwrap();

        let removal = pool.remove(&"foo");
        assert_eq!(pool.num_removing(), 1);
        drop(removal);
        assert_eq!(pool.num_removing(), 0);

        pool.done(a).unwrap();

        assert_eq!(pool.num_available(), 1);
    }

    #[test]
    fn pending_get_fails_when_pool_is_dropped() {
        let pool: Pool<&str> = Pool::new();
        let pending = pool.get();
        drop(pool);

        assert!(matches!(block_on(pending), Err(Error::PoolClosed)));
    }

    #[test]
    fn checkout_guard_checks_in_on_drop() {
        let pool = Pool::new();
        pool.add("foo");

        {
            let foo = block_on(pool.checkout()).unwrap();
            assert_eq!(*foo, "foo");
            assert_eq!(pool.num_checked_out(), 1);
        }

        assert_eq!(pool.num_available(), 1);

        let foo = block_on(pool.checkout()).unwrap();
        foo.release().unwrap();
        assert_eq!(pool.num_available(), 1);
    }
}

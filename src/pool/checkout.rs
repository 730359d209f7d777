use crate::error::Error;
use crate::pool::shared::{Request, SharedPool};
use futures_channel::oneshot;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Future returned by [`Pool::get`](super::Pool::get).
///
/// Dropping it before completion cancels the request. A resource that was already
/// assigned to this request is checked back in, so it is never lost.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Acquire<R>
where
    R: Clone + PartialEq,
{
    pool: Weak<SharedPool<R>>,
    state: AcquireState<R>,
}

enum AcquireState<R> {
    Ready(R),
    Waiting(oneshot::Receiver<R>),
    Done,
}

// `R` is never pinned; it is only moved out by value.
impl<R> Unpin for Acquire<R> where R: Clone + PartialEq {}

impl<R> Acquire<R>
where
    R: Clone + PartialEq,
{
    pub(crate) fn new(pool: &Arc<SharedPool<R>>, request: Request<R>) -> Self {
        let state = match request {
            Request::Ready(resource) => AcquireState::Ready(resource),
            Request::Waiting(rx) => AcquireState::Waiting(rx),
        };

        Self { pool: Arc::downgrade(pool), state }
    }

    /// Returns `true` if this request can complete without waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, AcquireState::Ready(_))
    }
}

impl<R> Future for Acquire<R>
where
    R: Clone + PartialEq,
{
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let result = match std::mem::replace(&mut this.state, AcquireState::Done) {
            AcquireState::Ready(resource) => Ok(resource),

            AcquireState::Waiting(mut rx) => match Pin::new(&mut rx).poll(cx) {
                Poll::Pending => {
                    this.state = AcquireState::Waiting(rx);
                    return Poll::Pending;
                }
                Poll::Ready(Ok(resource)) => Ok(resource),
                Poll::Ready(Err(oneshot::Canceled)) => Err(Error::PoolClosed),
            },

            AcquireState::Done => panic!("`Acquire` polled after completion"),
        };

        Poll::Ready(result)
    }
}

impl<R> Drop for Acquire<R>
where
    R: Clone + PartialEq,
{
    fn drop(&mut self) {
        let resource = match std::mem::replace(&mut self.state, AcquireState::Done) {
            AcquireState::Ready(resource) => resource,
            AcquireState::Waiting(mut rx) => {
                rx.close();
                match rx.try_recv() {
                    Ok(Some(resource)) => resource,
                    _ => return,
                }
            }
            AcquireState::Done => return,
        };

        if let Some(pool) = self.pool.upgrade() {
            tracing::trace!("checkout abandoned; returning resource");
            if let Err(error) = pool.done(resource) {
                tracing::warn!(%error, "failed to return abandoned checkout");
            }
        }
    }
}

impl<R> Debug for Acquire<R>
where
    R: Clone + PartialEq,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            AcquireState::Ready(_) => "ready",
            AcquireState::Waiting(_) => "waiting",
            AcquireState::Done => "done",
        };

        f.debug_struct("Acquire").field("state", &state).finish()
    }
}

/// A checked-out resource that is checked back in when dropped.
///
/// Obtained from [`Pool::checkout`](super::Pool::checkout). Use [`Checkout::release`]
/// to observe the result of the checkin.
pub struct Checkout<R>
where
    R: Clone + PartialEq,
{
    pool: Arc<SharedPool<R>>,
    resource: Option<R>,
}

impl<R> Checkout<R>
where
    R: Clone + PartialEq,
{
    pub(crate) fn new(pool: Arc<SharedPool<R>>, resource: R) -> Self {
        Self { pool, resource: Some(resource) }
    }

    /// Check the resource back in now.
    pub fn release(mut self) -> Result<(), Error> {
        match self.resource.take() {
            Some(resource) => self.pool.done(resource),
            None => Ok(()),
        }
    }
}

impl<R> Deref for Checkout<R>
where
    R: Clone + PartialEq,
{
    type Target = R;

    fn deref(&self) -> &R {
        self.resource.as_ref().expect("BUG: resource already released")
    }
}

impl<R> Drop for Checkout<R>
where
    R: Clone + PartialEq,
{
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(error) = self.pool.done(resource) {
                tracing::warn!(%error, "failed to check resource back in");
            }
        }
    }
}

impl<R> Debug for Checkout<R>
where
    R: Clone + PartialEq + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Checkout").field(&self.resource).finish()
    }
}

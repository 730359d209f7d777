use crate::error::Error;
use crate::pool::wait_list::WaitList;
use futures_channel::oneshot;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// State shared by every handle to one pool.
///
/// A known resource lives in exactly one of `available` or `checked_out`.
pub(crate) struct SharedPool<R> {
    state: Mutex<PoolState<R>>,
}

struct PoolState<R> {
    available: VecDeque<R>,
    checked_out: Vec<R>,
    waiting: WaitList<R>,
    // only populated for resources that are checked out
    removing: Vec<(R, WaitList<R>)>,
}

/// Outcome of a checkout or removal request.
pub(crate) enum Request<R> {
    Ready(R),
    Waiting(oneshot::Receiver<R>),
}

impl<R> SharedPool<R>
where
    R: Clone + PartialEq,
{
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                checked_out: Vec::new(),
                waiting: WaitList::new(),
                removing: Vec::new(),
            }),
        }
    }

    /// Returns `false` if the resource was already known.
    pub(crate) fn add(&self, resource: R) -> bool {
        let mut state = self.state.lock();

        if state.is_known(&resource) {
            return false;
        }

        state.release(resource);
        true
    }

    pub(crate) fn try_acquire(&self) -> Option<R> {
        self.state.lock().take_available()
    }

    pub(crate) fn acquire(&self) -> Request<R> {
        let mut state = self.state.lock();

        match state.take_available() {
            Some(resource) => Request::Ready(resource),
            None => {
                tracing::trace!("no resource available; queueing checkout");
                Request::Waiting(state.waiting.push())
            }
        }
    }

    pub(crate) fn done(&self, resource: R) -> Result<(), Error> {
        let mut state = self.state.lock();

        let pos = state
            .checked_out
            .iter()
            .position(|held| *held == resource)
            .ok_or(Error::NotCheckedOut)?;

        state.checked_out.swap_remove(pos);

        if let Some(pos) = state.removing.iter().position(|(held, _)| *held == resource) {
            let (_, removals) = state.removing.swap_remove(pos);
            let served = removals.fan_out(&resource);

            if served > 0 {
                tracing::debug!(removals = served, "removed resource after checkin");
                return Ok(());
            }

            // every removal was abandoned; treat as a plain checkin
        }

        state.release(resource);
        Ok(())
    }

    pub(crate) fn remove(&self, resource: &R) -> Result<Request<R>, Error> {
        let mut state = self.state.lock();

        if let Some(pos) = state.available.iter().position(|idle| idle == resource) {
            if let Some(removed) = state.available.remove(pos) {
                tracing::debug!("removed idle resource");
                return Ok(Request::Ready(removed));
            }
        }

        if !state.checked_out.contains(resource) {
            return Err(Error::UnknownResource);
        }

        tracing::debug!("resource in use; queueing removal until checkin");

        let pos = match state.removing.iter().position(|(held, _)| held == resource) {
            Some(pos) => pos,
            None => {
                state.removing.push((resource.clone(), WaitList::new()));
                state.removing.len() - 1
            }
        };

        Ok(Request::Waiting(state.removing[pos].1.push()))
    }

    pub(crate) fn num_available(&self) -> usize {
        self.state.lock().available.len()
    }

    pub(crate) fn num_checked_out(&self) -> usize {
        self.state.lock().checked_out.len()
    }

    pub(crate) fn num_waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub(crate) fn num_removing(&self) -> usize {
        let state = self.state.lock();
        state
            .removing
            .iter()
            .filter(|(_, removals)| !removals.is_empty())
            .count()
    }
}

impl<R> PoolState<R>
where
    R: Clone + PartialEq,
{
    fn is_known(&self, resource: &R) -> bool {
        self.available.contains(resource) || self.checked_out.contains(resource)
    }

    fn take_available(&mut self) -> Option<R> {
        let resource = self.available.pop_front()?;
        self.checked_out.push(resource.clone());
        Some(resource)
    }

    /// Hand a free resource to the earliest waiter, or park it in `available`.
    fn release(&mut self, resource: R) {
        match self.waiting.hand_off(resource.clone()) {
            Ok(()) => {
                tracing::trace!("resource handed to waiting checkout");
                self.checked_out.push(resource);
            }
            Err(resource) => self.available.push_back(resource),
        }
    }
}

use futures_channel::oneshot;
use std::collections::VecDeque;

/// FIFO queue of tasks waiting to be handed a resource.
///
/// A waiter whose receiving half was dropped is skipped, never served.
pub(crate) struct WaitList<R> {
    waiters: VecDeque<oneshot::Sender<R>>,
}

impl<R> WaitList<R> {
    pub(crate) fn new() -> Self {
        Self { waiters: VecDeque::new() }
    }

    /// Enqueue a new waiter at the back of the line.
    pub(crate) fn push(&mut self) -> oneshot::Receiver<R> {
        self.waiters.retain(|waiter| !waiter.is_canceled());

        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Give `resource` to the earliest waiter that is still listening.
    ///
    /// Returns the resource back if nobody took it.
    pub(crate) fn hand_off(&mut self, mut resource: R) -> Result<(), R> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(resource) {
                Ok(()) => return Ok(()),
                Err(returned) => resource = returned,
            }
        }

        Err(resource)
    }

    /// Number of waiters that are still listening.
    pub(crate) fn len(&self) -> usize {
        self.waiters.iter().filter(|waiter| !waiter.is_canceled()).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Clone> WaitList<R> {
    /// Resolve every waiter with a copy of `resource`, in queue order.
    ///
    /// Returns how many waiters were still listening.
    pub(crate) fn fan_out(self, resource: &R) -> usize {
        self.waiters
            .into_iter()
            .filter_map(|waiter| waiter.send(resource.clone()).ok())
            .count()
    }
}

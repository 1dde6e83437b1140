//! Completion handles for observing asynchronous shutdown drains.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::utils::Deadline;

/// An observable handle for a result-less asynchronous task.
///
/// Returned by [`Pool::shutdown`]; completes when the drain has
/// deallocated every object the pool ever allocated. Cloned handles
/// observe the same drain. Once a wait has observed completion, all
/// subsequent waits return immediately.
///
/// # Examples
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # fn demo(completion: slotpool::Completion) {
/// if !completion.wait_timeout(Duration::from_millis(50)) {
///     // drain still waiting on claimed objects
///     completion.wait();
/// }
/// # }
/// ```
///
/// [`Pool::shutdown`]: crate::Pool::shutdown
#[derive(Clone)]
pub struct Completion {
    latch: Arc<Latch>,
}

struct Latch {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            latch: Arc::new(Latch {
                done: Mutex::new(false),
                signal: Condvar::new(),
            }),
        }
    }

    pub(crate) fn complete(&self) {
        let mut done = self.latch.done.lock();
        *done = true;
        self.latch.signal.notify_all();
    }

    /// Blocks until the drain has finished.
    pub fn wait(&self) {
        let mut done = self.latch.done.lock();
        while !*done {
            self.latch.signal.wait(&mut done);
        }
    }

    /// Blocks until the drain has finished or `timeout` elapses.
    ///
    /// Returns `true` if the drain completed within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Deadline::bounded(timeout);
        let mut done = self.latch.done.lock();
        loop {
            if *done {
                return true;
            }
            match deadline.remaining() {
                Some(remaining) if !remaining.is_zero() => {
                    let _ = self.latch.signal.wait_for(&mut done, remaining);
                }
                Some(_) => return false,
                None => self.latch.signal.wait(&mut done),
            }
        }
    }

    /// Returns whether the drain has already finished, without blocking.
    pub fn is_complete(&self) -> bool {
        *self.latch.done.lock()
    }
}

impl core::fmt::Debug for Completion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}

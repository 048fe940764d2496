//! Countdown barrier and in-flight counter.

use parking_lot::{Condvar, Mutex};

/// Releases waiters once it has been counted down `count` times.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Counts down once. Extra calls after reaching zero are ignored.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}

/// Number of tasks handed to workers and not yet finished.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl InFlight {
    pub(crate) fn increment(&self) {
        *self.count.lock() += 1;
    }

    pub(crate) fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    pub(crate) fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Blocks until no task is in flight.
    pub(crate) fn wait_for_zero(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

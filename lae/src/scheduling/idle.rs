//! Pool of idle workers, ordered by fatigue.
//!
//! Workers are keyed on the fatigue they had when they became idle. A worker
//! in the pool runs nothing, so that snapshot equals its live fatigue for as
//! long as it stays there.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use lae_api::errors::SchedulingError;

use super::worker::TiredWorker;

struct IdleEntry {
    fatigue: f64,
    worker: Arc<TiredWorker>,
}

impl PartialEq for IdleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IdleEntry {}

impl PartialOrd for IdleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdleEntry {
    // Reversed: the max-heap yields the least tired worker, lowest id on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fatigue
            .total_cmp(&self.fatigue)
            .then_with(|| other.worker.id().cmp(&self.worker.id()))
    }
}

struct IdleState {
    heap: BinaryHeap<IdleEntry>,
    closed: bool,
}

/// Blocking min-fatigue queue of idle workers.
pub(crate) struct IdlePool {
    state: Mutex<IdleState>,
    available: Condvar,
}

impl IdlePool {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(IdleState {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Returns a worker to the pool and wakes one waiting submitter.
    pub(crate) fn push(&self, worker: Arc<TiredWorker>) {
        let fatigue = worker.fatigue();
        self.state.lock().heap.push(IdleEntry { fatigue, worker });
        self.available.notify_one();
    }

    /// Takes the least tired worker, blocking while none is idle.
    ///
    /// # Errors
    /// `ExecutorShutdown` once the pool is closed, including for callers
    /// already blocked here.
    pub(crate) fn pop(&self) -> Result<Arc<TiredWorker>, SchedulingError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(SchedulingError::ExecutorShutdown);
            }
            if let Some(entry) = state.heap.pop() {
                return Ok(entry.worker);
            }
            self.available.wait(&mut state);
        }
    }

    /// Closes the pool and wakes every blocked caller.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Ids of the idle workers in the order they would be handed out.
    pub(crate) fn order(&self) -> Vec<usize> {
        let state = self.state.lock();
        let mut entries: Vec<(f64, usize)> = state
            .heap
            .iter()
            .map(|e| (e.fatigue, e.worker.id()))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        entries.into_iter().map(|(_, id)| id).collect()
    }
}

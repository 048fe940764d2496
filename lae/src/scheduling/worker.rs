//! # Tired Worker Module
//!
//! A worker owns one dedicated OS thread and a single pending-task slot.
//! Every task it runs makes it more tired: the elapsed time, scaled by the
//! worker's fixed fatigue factor, is added to its fatigue score. The
//! executor uses that score to prefer the least tired idle worker.
//!
//! ## Key Concepts
//! - Task slot: a bounded channel of capacity one, filled only while idle
//! - Busy flag: set on assignment, cleared after the task has finished and
//!   its time has been recorded
//! - Completion hook: runs on the worker thread after the busy flag is
//!   cleared, so whoever it notifies sees an idle worker
//!
//! ## Lifecycle
//! 1. `spawn` starts the thread, which blocks on the empty slot
//! 2. `assign` fills the slot and marks the worker busy
//! 3. The thread runs the task, records time and fatigue, clears busy
//! 4. `shutdown` closes the slot; the thread drains what was assigned and exits

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use lae_api::errors::SchedulingError;
use lae_api::Task;

/// Callback run on the worker thread once the worker is idle again.
pub type CompletionHook = Box<dyn FnOnce(&Arc<TiredWorker>) + Send + 'static>;

/// A task plus the hook to run after it.
pub(crate) struct Job {
    task: Task,
    on_idle: Option<CompletionHook>,
}

impl Job {
    pub(crate) fn new(task: Task, on_idle: Option<CompletionHook>) -> Self {
        Self { task, on_idle }
    }
}

/// An assignment the worker refused, handed back so it can be retried.
pub(crate) struct Rejected {
    pub(crate) error: SchedulingError,
    pub(crate) job: Job,
}

/// Point-in-time view of a worker's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerStats {
    pub id: usize,
    pub fatigue_factor: f64,
    pub fatigue: f64,
    pub time_used: Duration,
    pub time_idle: Duration,
    pub tasks_completed: u64,
    pub busy: bool,
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Worker {}: fatigue factor {:.3}, time used {:?}, time idle {:?}, fatigue {:.2}",
            self.id,
            self.fatigue_factor,
            self.time_used,
            self.time_idle,
            self.fatigue
        )
    }
}

/// Mutable counters guarded by the worker's state lock.
#[derive(Debug, Default)]
struct WorkerState {
    busy: bool,
    shutdown: bool,
    fatigue: f64,
    time_used: Duration,
    time_idle: Duration,
    tasks_completed: u64,
}

/// # Tired Worker
///
/// A single worker thread with a one-task slot and a fatigue score.
///
/// ## Thread Safety
/// - `busy` and `shutdown` are checked and set under the state lock, which
///   also guards the counters the worker thread updates after each task
/// - Threads waiting for the worker to become idle park on `idle_signal`
///
/// ## Ownership
/// The worker thread only keeps a weak reference. Dropping the last strong
/// reference drops the slot's sender, which ends the thread once the slot is
/// drained.
pub struct TiredWorker {
    /// Unique identifier for this worker
    id: usize,

    /// Speed multiplier drawn once at creation
    fatigue_factor: f64,

    state: Mutex<WorkerState>,

    /// Signalled whenever the busy flag is cleared or shutdown begins
    idle_signal: Condvar,

    /// Sending half of the task slot; `None` once shut down
    slot: Mutex<Option<Sender<Job>>>,

    thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for TiredWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TiredWorker")
            .field("id", &self.id)
            .field("fatigue_factor", &self.fatigue_factor)
            .field("fatigue", &state.fatigue)
            .field("busy", &state.busy)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

impl TiredWorker {
    /// Creates a worker and starts its thread.
    ///
    /// # Arguments
    /// * `id` - Identifier reported in logs and statistics
    /// * `fatigue_factor` - Multiplier applied to execution time
    /// * `thread_name` - Name of the OS thread
    ///
    /// # Errors
    /// `ThreadSpawn` if the OS refuses to start the thread.
    pub fn spawn(
        id: usize,
        fatigue_factor: f64,
        thread_name: impl Into<String>,
    ) -> Result<Arc<Self>, SchedulingError> {
        let (sender, receiver) = flume::bounded(1);
        let worker = Arc::new(Self {
            id,
            fatigue_factor,
            state: Mutex::new(WorkerState::default()),
            idle_signal: Condvar::new(),
            slot: Mutex::new(Some(sender)),
            thread: Mutex::new(None),
        });

        let weak = Arc::downgrade(&worker);
        let handle = thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || Self::run_loop(weak, receiver, id))
            .map_err(|e| SchedulingError::ThreadSpawn(format!("worker {}: {}", id, e)))?;
        *worker.thread.lock() = Some(handle);

        debug!(worker = id, fatigue_factor, "worker spawned");
        Ok(worker)
    }

    /// Hands `task` to the worker.
    ///
    /// # Errors
    /// - `Busy` if the worker already holds a task
    /// - `Shutdown` if the worker has been shut down
    pub fn assign(&self, task: Task) -> Result<(), SchedulingError> {
        self.offer(Job::new(task, None)).map_err(|rejected| rejected.error)
    }

    /// Places `job` in the slot if the worker is idle, otherwise hands it back.
    pub(crate) fn offer(&self, job: Job) -> Result<(), Rejected> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Rejected { error: SchedulingError::Shutdown { worker: self.id }, job });
        }
        if state.busy {
            return Err(Rejected { error: SchedulingError::Busy { worker: self.id }, job });
        }

        let slot = self.slot.lock();
        let Some(sender) = slot.as_ref() else {
            return Err(Rejected { error: SchedulingError::Shutdown { worker: self.id }, job });
        };

        match sender.try_send(job) {
            Ok(()) => {
                state.busy = true;
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                Err(Rejected { error: SchedulingError::Busy { worker: self.id }, job })
            }
            Err(TrySendError::Disconnected(job)) => {
                Err(Rejected { error: SchedulingError::Shutdown { worker: self.id }, job })
            }
        }
    }

    /// Blocks until the worker is not busy, or until it is shutting down.
    pub fn wait_until_idle(&self) {
        let mut state = self.state.lock();
        while state.busy && !state.shutdown {
            self.idle_signal.wait(&mut state);
        }
    }

    /// Stops accepting tasks. A task already assigned still runs, then the
    /// thread exits.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        self.slot.lock().take();
        drop(state);
        self.idle_signal.notify_all();
        debug!(worker = self.id, "worker shutdown requested");
    }

    /// Waits for the worker thread to exit. Only meaningful after `shutdown`.
    pub fn join(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(worker = self.id, "worker thread terminated abnormally");
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn fatigue_factor(&self) -> f64 {
        self.fatigue_factor
    }

    pub fn fatigue(&self) -> f64 {
        self.state.lock().fatigue
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn time_used(&self) -> Duration {
        self.state.lock().time_used
    }

    pub fn time_idle(&self) -> Duration {
        self.state.lock().time_idle
    }

    pub fn stats(&self) -> WorkerStats {
        let state = self.state.lock();
        WorkerStats {
            id: self.id,
            fatigue_factor: self.fatigue_factor,
            fatigue: state.fatigue,
            time_used: state.time_used,
            time_idle: state.time_idle,
            tasks_completed: state.tasks_completed,
            busy: state.busy,
        }
    }

    /// Orders workers by their current fatigue, least tired first.
    ///
    /// The value is read live, so the ordering is only stable while neither
    /// worker is running a task.
    pub fn cmp_fatigue(&self, other: &TiredWorker) -> Ordering {
        self.fatigue().total_cmp(&other.fatigue())
    }

    /// Records a finished task and clears the busy flag.
    fn finish_task(&self, idle: Duration, elapsed: Duration) {
        let mut state = self.state.lock();
        state.time_idle += idle;
        state.time_used += elapsed;
        state.fatigue += self.fatigue_factor * elapsed.as_nanos() as f64;
        state.tasks_completed += 1;
        state.busy = false;
        drop(state);
        self.idle_signal.notify_all();
    }

    /// Main loop of the worker thread.
    fn run_loop(worker: Weak<TiredWorker>, jobs: Receiver<Job>, id: usize) {
        let span = crate::worker_span!(id);
        let _guard = span.enter();
        debug!("worker loop started");

        let mut idle_since = Instant::now();
        while let Ok(job) = jobs.recv() {
            let idle = idle_since.elapsed();
            let Job { task, on_idle } = job;

            let started = Instant::now();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                error!(worker = id, "task panicked: {}", panic_message(payload.as_ref()));
            }
            let elapsed = started.elapsed();

            let Some(worker) = worker.upgrade() else {
                break;
            };
            worker.finish_task(idle, elapsed);
            if let Some(hook) = on_idle {
                hook(&worker);
            }
            drop(worker);

            idle_since = Instant::now();
        }

        debug!("worker loop stopped");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

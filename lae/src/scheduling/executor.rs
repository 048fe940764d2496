//! # Tired Executor
//!
//! A fixed pool of [`TiredWorker`]s that always hands the next task to the
//! least tired idle worker.
//!
//! ## Key Concepts
//! - Fatigue factor: drawn once per worker from the configured range, it
//!   scales how quickly a worker tires. Fast or rarely used workers end up
//!   at the front of the idle pool more often, which balances load across
//!   workers of different speed without partitioning the work up front.
//! - Idle pool: workers not running anything, ordered by fatigue. `submit`
//!   blocks while it is empty.
//! - In-flight count: tasks handed to a worker and not yet finished.
//!
//! ## Task Flow
//! 1. `submit` takes the least tired idle worker and counts the task in flight
//! 2. The task is assigned together with a completion hook
//! 3. The worker runs the task, records its fatigue, clears its busy flag
//! 4. The hook returns the worker to the idle pool and ends the in-flight count

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use lae_api::errors::SchedulingError;
use lae_api::Task;

use super::idle::IdlePool;
use super::latch::InFlight;
use super::worker::{CompletionHook, Job, Rejected, TiredWorker, WorkerStats};
use crate::config::ExecutorConfig;

const SCHEDULER: &str = "tired_executor";

/// Fatigue-aware worker pool.
///
/// # Example
/// ```rust,no_run
/// use lae::config::ExecutorConfig;
/// use lae::scheduling::TiredExecutor;
///
/// let executor = TiredExecutor::new(ExecutorConfig::with_pool_size(4))?;
/// executor.submit(|| println!("hello from a worker"))?;
/// executor.wait_for_idle();
/// println!("{}", executor.report());
/// executor.shutdown();
/// # Ok::<(), lae_api::SchedulingError>(())
/// ```
pub struct TiredExecutor {
    workers: Vec<Arc<TiredWorker>>,
    idle: Arc<IdlePool>,
    in_flight: Arc<InFlight>,
    shut_down: AtomicBool,
}

impl TiredExecutor {
    /// Spawns `config.pool_size` workers with random fatigue factors.
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration does not validate
    /// - `ThreadSpawn` if a worker thread cannot be started; workers spawned
    ///   before the failure are shut down again
    pub fn new(config: ExecutorConfig) -> Result<Self, SchedulingError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let idle = Arc::new(IdlePool::new());
        let mut workers = Vec::with_capacity(config.pool_size);
        for id in 0..config.pool_size {
            let factor = rng.random_range(config.fatigue_factor_range());
            let name = format!("{}{}", config.thread_name_prefix, id);
            match TiredWorker::spawn(id, factor, name) {
                Ok(worker) => {
                    idle.push(Arc::clone(&worker));
                    workers.push(worker);
                }
                Err(e) => {
                    for worker in &workers {
                        worker.shutdown();
                        worker.join();
                    }
                    return Err(e);
                }
            }
        }

        info!(pool_size = config.pool_size, "executor started");
        Ok(Self {
            workers,
            idle,
            in_flight: Arc::new(InFlight::default()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Runs `task` on the least tired idle worker, blocking until one is
    /// available. Returns as soon as the task is handed off.
    ///
    /// # Errors
    /// - `ExecutorShutdown` if the executor is, or becomes, shut down while
    ///   waiting for a worker
    /// - `Shutdown` if the chosen worker was shut down underneath us
    pub fn submit<F>(&self, task: F) -> Result<(), SchedulingError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Box::new(task))
    }

    /// Submits every task in turn. Does not wait for any of them to finish.
    ///
    /// # Errors
    /// Stops at the first failed submission. Tasks not yet submitted are
    /// dropped without running.
    pub fn submit_all<I>(&self, tasks: I) -> Result<(), SchedulingError>
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            self.submit_task(task)?;
        }
        Ok(())
    }

    fn submit_task(&self, task: Task) -> Result<(), SchedulingError> {
        if self.is_shut_down() {
            return Err(SchedulingError::ExecutorShutdown);
        }

        let worker = self.idle.pop()?;
        self.in_flight.increment();

        let idle = Arc::clone(&self.idle);
        let in_flight = Arc::clone(&self.in_flight);
        let hook: CompletionHook = Box::new(move |worker| {
            idle.push(Arc::clone(worker));
            in_flight.decrement();
        });

        let mut job = Job::new(task, Some(hook));
        loop {
            match worker.offer(job) {
                Ok(()) => {
                    crate::log_scheduler!(
                        SCHEDULER,
                        "task_dispatched",
                        worker = worker.id(),
                        fatigue = worker.fatigue()
                    );
                    return Ok(());
                }
                // Defensive only: the hook re-queues a worker after it clears busy
                Err(Rejected { error: SchedulingError::Busy { worker: id }, job: returned }) => {
                    crate::log_scheduler!(SCHEDULER, "worker_still_busy", worker = id);
                    worker.wait_until_idle();
                    job = returned;
                }
                Err(Rejected { error, .. }) => {
                    self.idle.push(worker);
                    self.in_flight.decrement();
                    return Err(error);
                }
            }
        }
    }

    /// Stops accepting tasks, lets every worker finish what it was given and
    /// waits for the worker threads to exit. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("executor shutting down");
        self.idle.close();
        for worker in &self.workers {
            worker.shutdown();
        }
        for worker in &self.workers {
            worker.join();
        }
        info!("executor stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// One line per worker, in worker order.
    pub fn report(&self) -> String {
        let mut report = String::new();
        for stats in self.worker_stats() {
            let _ = writeln!(report, "{}", stats);
        }
        report
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    pub fn idle_workers(&self) -> usize {
        self.idle.len()
    }

    /// Ids of the idle workers in the order `submit` would pick them.
    pub fn idle_order(&self) -> Vec<usize> {
        self.idle.order()
    }

    /// Blocks until every submitted task has finished.
    pub fn wait_for_idle(&self) {
        self.in_flight.wait_for_zero();
    }
}

impl Drop for TiredExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_rejects_invalid_config() {
        let result = TiredExecutor::new(ExecutorConfig::with_pool_size(0));
        assert!(matches!(result, Err(SchedulingError::InvalidConfig(_))));
    }

    #[test]
    fn test_seeded_factors_are_reproducible() {
        let factors = |seed| {
            let executor = TiredExecutor::new(ExecutorConfig::with_pool_size(3).seeded(seed)).unwrap();
            executor
                .worker_stats()
                .iter()
                .map(|s| s.fatigue_factor)
                .collect::<Vec<_>>()
        };
        let first = factors(11);
        assert_eq!(first, factors(11));
        assert!(first.iter().all(|f| (0.5..1.5).contains(f)));
    }

    #[test]
    fn test_all_tasks_run() {
        let executor = TiredExecutor::new(ExecutorConfig::with_pool_size(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            executor
                .submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        executor.wait_for_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(executor.in_flight(), 0);
        assert_eq!(executor.idle_workers(), 2);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let executor = TiredExecutor::new(ExecutorConfig::with_pool_size(1)).unwrap();
        executor.shutdown();
        executor.shutdown();
        assert_eq!(executor.submit(|| {}), Err(SchedulingError::ExecutorShutdown));
    }

    #[test]
    fn test_report_lists_every_worker() {
        let executor = TiredExecutor::new(ExecutorConfig::with_pool_size(3)).unwrap();
        let report = executor.report();
        assert_eq!(report.lines().count(), 3);
        for id in 0..3 {
            assert!(report.contains(&format!("Worker {}:", id)));
        }
    }
}

//! Fatigue-aware scheduling: workers, the idle pool and the executor that
//! ties them together.

pub mod executor;
mod idle;
pub mod latch;
pub mod worker;

pub use executor::TiredExecutor;
pub use latch::CompletionLatch;
pub use worker::{CompletionHook, TiredWorker, WorkerStats};

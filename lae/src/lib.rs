// Row-parallel linear algebra engine
//
// Evaluates matrix expression trees node by node. Every node is split into
// one task per row, and the tasks run on a pool of worker threads that
// prefers the least tired worker.

pub mod config;
pub mod engine;
pub mod io;
pub mod logging;
pub mod memory;
pub mod scheduling;

// Re-export commonly used types
pub use config::ExecutorConfig;
pub use engine::LinearAlgebraEngine;
pub use memory::{SharedMatrix, SharedVector};
pub use scheduling::{CompletionLatch, TiredExecutor, TiredWorker, WorkerStats};

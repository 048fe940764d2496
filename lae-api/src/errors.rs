//! # Engine Error Types
//!
//! This module defines the error types used throughout the linear algebra
//! engine. Errors are split by concern so each layer can return exactly the
//! failures it is able to produce:
//!
//! - `ComputeError`: validation failures of vectors, matrices and tree nodes
//! - `SchedulingError`: rejected assignments and pool lifecycle failures
//! - `EngineError`: everything a full `run` can surface to its caller
//!
//! All validation errors are raised synchronously at the call that violates
//! the contract. None are retried automatically.
//!
//! ## Usage Example
//!
//! ```rust
//! use lae_api::errors::{ComputeError, EngineError};
//!
//! fn describe(error: &EngineError) -> String {
//!     match error {
//!         EngineError::Compute(ComputeError::DimensionMismatch(msg)) => {
//!             format!("shapes do not line up: {}", msg)
//!         }
//!         other => other.to_string(),
//!     }
//! }
//! ```

use thiserror::Error;

use crate::types::Orientation;

/// Validation failures raised by shared vectors, shared matrices and the
/// expression tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    /// Null, empty or malformed construction arguments, or a node with the
    /// wrong number of children.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operator child is not yet a resolved matrix leaf.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Vector/vector or vector/matrix lengths are incompatible.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An operation was called with an illegal orientation combination.
    ///
    /// # Parameters
    /// * `operation` - Name of the rejected operation
    /// * `left` - Orientation of the receiver
    /// * `right` - Orientation of the operand, when there is one
    #[error("Orientation mismatch in {operation}: {left} vs {right:?}")]
    OrientationMismatch {
        operation: &'static str,
        left: Orientation,
        right: Option<Orientation>,
    },

    /// Index access outside `[0, len)`.
    #[error("Index {index} is out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Orientation query on a matrix with no vectors loaded.
    #[error("Matrix is empty")]
    EmptyMatrix,

    /// The tree has no resolvable node but is not fully resolved either.
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
}

/// Failures of the worker pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// The worker already holds a task.
    #[error("Worker {worker} is busy")]
    Busy { worker: usize },

    /// The worker has been told to shut down and accepts no more tasks.
    #[error("Worker {worker} is shut down")]
    Shutdown { worker: usize },

    /// The executor is shutting down; blocked submitters are released with this.
    #[error("Executor is shut down")]
    ExecutorShutdown,

    /// The pool configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operating system refused to start a worker thread.
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
}

/// Errors surfaced by the computation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    /// At least one row task of a node failed. The node stays unresolved.
    ///
    /// # Parameters
    /// * `failed` - Number of rows that failed
    /// * `total` - Number of rows in the batch
    /// * `first` - Error of the lowest failing row index
    #[error("{failed} of {total} row tasks failed; first failure: {first}")]
    RowTaskFailed {
        failed: usize,
        total: usize,
        first: ComputeError,
    },

    /// Catch-all for failures outside the taxonomy.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias for vector, matrix and tree validation.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Result alias for the engine.
pub type EngineResult<T> = Result<T, EngineError>;

//! # Linear Algebra Engine
//!
//! Evaluates an expression tree one node at a time. For each resolvable node
//! the engine loads the operands into its two long-lived shared matrices,
//! builds one task per row, runs the batch on the [`TiredExecutor`] and waits
//! for every row before reading the result back into the tree.
//!
//! ## Key Concepts
//! - Left and right slots: the shared matrices operands are loaded into. Row
//!   tasks mutate the left slot in place; it holds the result afterwards.
//! - Row batch: rows of one node run in parallel and never touch each other.
//!   Nodes are strictly serialized: a node's batch must finish before the
//!   next node is loaded.
//! - Row failures: every row runs to completion. If any row failed, the node
//!   fails with the error of the lowest failing row and stays unresolved.

use std::sync::Arc;

use crossbeam_queue::SegQueue;
use tracing::{debug, info, info_span};

use lae_api::errors::{ComputeError, ComputeResult, EngineError, EngineResult};
use lae_api::{ComputationNode, MatrixData, Operator, Orientation, Task};

use crate::config::ExecutorConfig;
use crate::memory::SharedMatrix;
use crate::scheduling::{CompletionLatch, TiredExecutor};

/// Work for a single row of the left slot.
type RowTask = Box<dyn FnOnce() -> ComputeResult<()> + Send + 'static>;

/// Drives an expression tree to a single resolved matrix.
///
/// An engine evaluates one tree at a time: `run` and `load_and_compute` take
/// `&mut self`, since the shared slots are reused between nodes.
pub struct LinearAlgebraEngine {
    left: Arc<SharedMatrix>,
    right: Arc<SharedMatrix>,
    executor: TiredExecutor,
}

impl LinearAlgebraEngine {
    /// Creates an engine with its own executor.
    ///
    /// # Errors
    /// Any `SchedulingError` from building the executor.
    pub fn new(config: ExecutorConfig) -> EngineResult<Self> {
        Ok(Self::with_executor(TiredExecutor::new(config)?))
    }

    pub fn with_executor(executor: TiredExecutor) -> Self {
        Self {
            left: Arc::new(SharedMatrix::new()),
            right: Arc::new(SharedMatrix::new()),
            executor,
        }
    }

    pub fn executor(&self) -> &TiredExecutor {
        &self.executor
    }

    /// Resolves `root` completely and returns it as a matrix leaf.
    ///
    /// # Errors
    /// - `InconsistentState` if the tree is unresolved but has no node whose
    ///   children are all matrices
    /// - Anything `load_and_compute` reports for the node being evaluated
    pub fn run(&mut self, mut root: ComputationNode) -> EngineResult<ComputationNode> {
        info!(pending = root.pending_operations(), "evaluation started");

        while !root.is_resolved() {
            let node = root.find_resolvable().ok_or_else(|| {
                ComputeError::InconsistentState(
                    "tree is not resolved but no node has only matrix operands".to_string(),
                )
            })?;
            self.load_and_compute(node)?;
        }

        info!("evaluation finished");
        Ok(root)
    }

    /// Evaluates a single node whose children are all matrices and replaces
    /// it with the result.
    ///
    /// # Errors
    /// - `InvalidInput` if `node` is already a matrix or has the wrong number
    ///   of children
    /// - `TypeMismatch` if a child is not a matrix
    /// - `InvalidInput` or `DimensionMismatch` for malformed or incompatible
    ///   operands
    /// - `RowTaskFailed` if a row task failed; `node` is left unchanged
    /// - `Scheduling` if the row batch could not be submitted
    pub fn load_and_compute(&mut self, node: &mut ComputationNode) -> EngineResult<()> {
        let ComputationNode::Operation { op, children } = &*node else {
            return Err(ComputeError::InvalidInput("node is already a matrix".to_string()).into());
        };
        let op = *op;

        if children.len() != op.arity() {
            return Err(ComputeError::InvalidInput(format!(
                "{} expects {} operand(s), got {}",
                op,
                op.arity(),
                children.len()
            ))
            .into());
        }
        let operands = children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                child.get_matrix().ok_or_else(|| {
                    ComputeError::TypeMismatch(format!(
                        "operand {} of {} is an unresolved {:?} node",
                        i,
                        op,
                        child.node_type()
                    ))
                })
            })
            .collect::<ComputeResult<Vec<&MatrixData>>>()?;

        let span = info_span!("node", op = %op);
        let _guard = span.enter();

        let tasks = match op {
            Operator::Add => {
                self.left.load_row_major(operands[0])?;
                self.right.load_row_major(operands[1])?;
                self.create_add_tasks()?
            }
            Operator::Multiply => {
                self.left.load_row_major(operands[0])?;
                self.right.load_column_major(operands[1])?;
                self.create_multiply_tasks()?
            }
            Operator::Negate => {
                self.left.load_row_major(operands[0])?;
                self.create_negate_tasks()?
            }
            Operator::Transpose => {
                self.left.load_row_major(operands[0])?;
                self.create_transpose_tasks()
            }
        };

        self.execute_and_wait(tasks)?;

        let result = self.left.read_row_major()?;
        let (rows, cols) = (result.len(), result.first().map_or(0, Vec::len));
        node.resolve(result);
        crate::log_node!(op, "resolved", rows, cols);
        Ok(())
    }

    /// Worker statistics, one line per worker.
    pub fn report(&self) -> String {
        self.executor.report()
    }

    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    fn create_add_tasks(&self) -> ComputeResult<Vec<RowTask>> {
        ensure_row_major(&self.left)?;
        ensure_row_major(&self.right)?;

        let left_dims = self.left.dimensions()?;
        let right_dims = self.right.dimensions()?;
        if left_dims != right_dims {
            return Err(ComputeError::DimensionMismatch(format!(
                "cannot add {}x{} and {}x{} matrices",
                left_dims.0, left_dims.1, right_dims.0, right_dims.1
            )));
        }

        let rights = self.right.vectors();
        Ok(self
            .left
            .vectors()
            .iter()
            .zip(rights.iter())
            .map(|(row, other)| {
                let (row, other) = (Arc::clone(row), Arc::clone(other));
                Box::new(move || row.add(&other)) as RowTask
            })
            .collect())
    }

    fn create_multiply_tasks(&self) -> ComputeResult<Vec<RowTask>> {
        ensure_row_major(&self.left)?;

        let (_, left_cols) = self.left.dimensions()?;
        let (right_rows, right_cols) = self.right.dimensions()?;
        if left_cols != right_rows {
            return Err(ComputeError::DimensionMismatch(format!(
                "cannot multiply a matrix with {} columns by a {}x{} matrix",
                left_cols, right_rows, right_cols
            )));
        }

        Ok(self
            .left
            .vectors()
            .iter()
            .map(|row| {
                let row = Arc::clone(row);
                let right = Arc::clone(&self.right);
                Box::new(move || row.vec_mat_mul(&right)) as RowTask
            })
            .collect())
    }

    fn create_negate_tasks(&self) -> ComputeResult<Vec<RowTask>> {
        ensure_row_major(&self.left)?;
        Ok(self
            .left
            .vectors()
            .iter()
            .map(|row| {
                let row = Arc::clone(row);
                Box::new(move || {
                    row.negate();
                    Ok(())
                }) as RowTask
            })
            .collect())
    }

    fn create_transpose_tasks(&self) -> Vec<RowTask> {
        self.left
            .vectors()
            .iter()
            .map(|row| {
                let row = Arc::clone(row);
                Box::new(move || {
                    row.transpose();
                    Ok(())
                }) as RowTask
            })
            .collect()
    }

    /// Runs the batch and blocks until every row has reported back.
    fn execute_and_wait(&self, tasks: Vec<RowTask>) -> EngineResult<()> {
        let total = tasks.len();
        let latch = Arc::new(CompletionLatch::new(total));
        let failures = Arc::new(SegQueue::new());

        let batch: Vec<Task> = tasks
            .into_iter()
            .enumerate()
            .map(|(row, task)| {
                let guard = RowGuard {
                    row,
                    finished: false,
                    latch: Arc::clone(&latch),
                    failures: Arc::clone(&failures),
                };
                Box::new(move || {
                    let mut guard = guard;
                    if let Err(e) = task() {
                        guard.failures.push((row, e));
                    }
                    guard.finished = true;
                }) as Task
            })
            .collect();

        debug!(rows = total, "submitting row batch");
        let submitted = self.executor.submit_all(batch);
        latch.wait();
        submitted?;

        let mut failed: Vec<(usize, ComputeError)> = std::iter::from_fn(|| failures.pop()).collect();
        if failed.is_empty() {
            return Ok(());
        }
        failed.sort_by_key(|(row, _)| *row);
        let count = failed.len();
        let (row, first) = failed.swap_remove(0);
        crate::log_error!(first, row, failed = count, total);
        Err(EngineError::RowTaskFailed {
            failed: count,
            total,
            first,
        })
    }
}

/// Signals the batch latch exactly once per row, whether the row ran,
/// failed, panicked or was never started.
struct RowGuard {
    row: usize,
    finished: bool,
    latch: Arc<CompletionLatch>,
    failures: Arc<SegQueue<(usize, ComputeError)>>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.failures.push((
                self.row,
                ComputeError::InconsistentState(format!("row task {} did not complete", self.row)),
            ));
        }
        self.latch.count_down();
    }
}

/// Reloads `matrix` as row-major if it is currently column-oriented.
fn ensure_row_major(matrix: &SharedMatrix) -> ComputeResult<()> {
    if matrix.orientation()? == Orientation::Column {
        let data = matrix.read_row_major()?;
        matrix.load_row_major(&data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(threads: usize) -> LinearAlgebraEngine {
        LinearAlgebraEngine::new(ExecutorConfig::with_pool_size(threads).seeded(3)).unwrap()
    }

    #[test]
    fn test_ensure_row_major_reloads_columns() {
        let m = SharedMatrix::new();
        m.load_column_major(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        ensure_row_major(&m).unwrap();
        assert_eq!(m.orientation(), Ok(Orientation::Row));
        assert_eq!(m.read_row_major().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_row_failure_leaves_node_unresolved() {
        let engine = engine(2);
        let tasks: Vec<RowTask> = vec![
            Box::new(|| Ok(())),
            Box::new(|| Err(ComputeError::InvalidInput("row 1".to_string()))),
            Box::new(|| Err(ComputeError::EmptyMatrix)),
        ];
        let err = engine.execute_and_wait(tasks).unwrap_err();
        match err {
            EngineError::RowTaskFailed { failed, total, first } => {
                assert_eq!((failed, total), (2, 3));
                assert_eq!(first, ComputeError::InvalidInput("row 1".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panicking_row_counts_as_failure() {
        let engine = engine(2);
        let tasks: Vec<RowTask> = vec![Box::new(|| Ok(())), Box::new(|| panic!("row exploded"))];
        let err = engine.execute_and_wait(tasks).unwrap_err();
        assert!(matches!(err, EngineError::RowTaskFailed { failed: 1, total: 2, .. }));
    }

    #[test]
    fn test_batch_after_shutdown_still_releases_latch() {
        let engine = engine(1);
        engine.shutdown();
        let tasks: Vec<RowTask> = vec![Box::new(|| Ok(())), Box::new(|| Ok(()))];
        let err = engine.execute_and_wait(tasks).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Scheduling(lae_api::SchedulingError::ExecutorShutdown)
        ));
    }
}

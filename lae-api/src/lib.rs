//! # Linear Algebra Engine API
//!
//! Shared vocabulary for the row-parallel linear algebra engine. This crate
//! holds the contracts the engine consumes and produces, independent of how
//! work is scheduled or how matrices are stored.
//!
//! ## Core Components
//!
//! - **Errors**: the failure taxonomy shared by memory, scheduling and the engine
//! - **Types**: orientation tags, row-major matrix data and the task type
//! - **Expression tree**: the operator tree the engine resolves node by node
//!
//! ## Usage Example
//!
//! ```rust
//! use lae_api::{ComputationNode, Operator};
//!
//! let root = ComputationNode::operation(
//!     Operator::Add,
//!     vec![
//!         ComputationNode::matrix(vec![vec![1.0, 2.0]]),
//!         ComputationNode::matrix(vec![vec![3.0, 4.0]]),
//!     ],
//! );
//! assert!(!root.is_resolved());
//! ```
//!
//! ## Module Organization
//!
//! - [`errors`]: Error types and handling
//! - [`types`]: Common type definitions
//! - [`expression`]: Expression tree nodes and traversal

pub mod errors;
pub mod expression;
pub mod types;

pub use errors::{ComputeError, EngineError, SchedulingError};
pub use expression::{ComputationNode, ComputationNodeType, Operator};
pub use types::{MatrixData, Orientation, Task};

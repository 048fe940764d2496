//! # Shared Memory Module
//!
//! Lock-protected vectors and matrices that row tasks mutate concurrently.
//!
//! ## Key Concepts
//! - Orientation: a vector is a row or a column, and a matrix stores all of
//!   its vectors in one orientation
//! - Per-vector locks: each row task only locks the vectors it touches
//! - Wholesale loads: a matrix swaps its entire vector list on load

pub mod matrix;
pub mod vector;

pub use matrix::SharedMatrix;
pub use vector::SharedVector;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Row-major matrix payload: one inner `Vec` per row.
pub type MatrixData = Vec<Vec<f64>>;

/// A unit of work handed to a worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Whether a vector stands for a row or a column of its matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Row,
    Column,
}

impl Orientation {
    /// The other orientation.
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Row => Orientation::Column,
            Orientation::Column => Orientation::Row,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Row => write!(f, "row"),
            Orientation::Column => write!(f, "column"),
        }
    }
}

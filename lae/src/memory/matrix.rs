//! # Shared Matrix
//!
//! An ordered list of [`SharedVector`]s that all share one orientation. A
//! row-oriented matrix stores one vector per row, a column-oriented matrix one
//! vector per column.
//!
//! The vector list sits behind its own reader/writer lock and is replaced
//! wholesale on every load. `read_row_major` holds that lock for reading and
//! then read-locks every vector in index order before copying, so a read is a
//! consistent snapshot: it can neither interleave with a load nor observe a
//! row task half way through its vector.

use std::sync::Arc;

use parking_lot::RwLock;

use lae_api::errors::{ComputeError, ComputeResult};
use lae_api::{MatrixData, Orientation};

use super::vector::SharedVector;

/// A matrix whose rows (or columns) can be mutated by concurrent row tasks.
#[derive(Debug)]
pub struct SharedMatrix {
    vectors: RwLock<Arc<[Arc<SharedVector>]>>,
}

impl SharedMatrix {
    /// Creates an empty matrix with no vectors loaded.
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Creates a row-oriented matrix from row-major data.
    ///
    /// # Errors
    /// `InvalidInput` on zero rows, zero columns or ragged rows.
    pub fn from_row_major(data: &[Vec<f64>]) -> ComputeResult<Self> {
        let matrix = Self::new();
        matrix.load_row_major(data)?;
        Ok(matrix)
    }

    /// Replaces the contents with one row vector per input row.
    ///
    /// # Errors
    /// `InvalidInput` on zero rows, zero columns or ragged rows.
    pub fn load_row_major(&self, data: &[Vec<f64>]) -> ComputeResult<()> {
        validate_shape(data)?;
        let vectors: Vec<Arc<SharedVector>> = data
            .iter()
            .map(|row| Arc::new(SharedVector::new(row.clone(), Orientation::Row)))
            .collect();
        *self.vectors.write() = Arc::from(vectors);
        Ok(())
    }

    /// Replaces the contents with one column vector per input column,
    /// transposing the row-major input during the load.
    ///
    /// # Errors
    /// `InvalidInput` on zero rows, zero columns or ragged rows.
    pub fn load_column_major(&self, data: &[Vec<f64>]) -> ComputeResult<()> {
        let (_, cols) = validate_shape(data)?;
        let vectors: Vec<Arc<SharedVector>> = (0..cols)
            .map(|j| {
                let column = data.iter().map(|row| row[j]).collect();
                Arc::new(SharedVector::new(column, Orientation::Column))
            })
            .collect();
        *self.vectors.write() = Arc::from(vectors);
        Ok(())
    }

    /// Materializes the matrix as row-major data, whatever the internal
    /// orientation. An unloaded matrix reads as empty.
    ///
    /// # Errors
    /// `DimensionMismatch` if the vectors no longer share one length, which
    /// can only happen after an external `vec_mat_mul` left a column
    /// matrix inconsistent.
    pub fn read_row_major(&self) -> ComputeResult<MatrixData> {
        let vectors = self.vectors.read();
        let guards: Vec<_> = vectors.iter().map(|v| v.read()).collect();

        let Some(first) = guards.first() else {
            return Ok(Vec::new());
        };
        let orientation = first.orientation;
        let len = first.values.len();

        if let Some(bad) = guards.iter().find(|g| g.values.len() != len) {
            return Err(ComputeError::DimensionMismatch(format!(
                "matrix vectors disagree on length: {} vs {}",
                len,
                bad.values.len()
            )));
        }

        let result = match orientation {
            Orientation::Row => guards.iter().map(|g| g.values.clone()).collect(),
            Orientation::Column => (0..len)
                .map(|i| guards.iter().map(|g| g.values[i]).collect())
                .collect(),
        };
        Ok(result)
    }

    /// Vector at `index`.
    ///
    /// # Errors
    /// `OutOfRange` if there is no such vector.
    pub fn get(&self, index: usize) -> ComputeResult<Arc<SharedVector>> {
        let vectors = self.vectors.read();
        vectors
            .get(index)
            .cloned()
            .ok_or(ComputeError::OutOfRange { index, len: vectors.len() })
    }

    /// Number of stored vectors (rows when row-oriented, else columns).
    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    /// Orientation shared by the stored vectors.
    ///
    /// # Errors
    /// `EmptyMatrix` if nothing is loaded.
    pub fn orientation(&self) -> ComputeResult<Orientation> {
        self.vectors
            .read()
            .first()
            .map(|v| v.orientation())
            .ok_or(ComputeError::EmptyMatrix)
    }

    /// Effective `(rows, cols)` of the matrix.
    ///
    /// # Errors
    /// `EmptyMatrix` if nothing is loaded.
    pub fn dimensions(&self) -> ComputeResult<(usize, usize)> {
        let vectors = self.vectors.read();
        let first = vectors.first().ok_or(ComputeError::EmptyMatrix)?;
        let data = first.read();
        Ok(match data.orientation {
            Orientation::Row => (vectors.len(), data.values.len()),
            Orientation::Column => (data.values.len(), vectors.len()),
        })
    }

    /// Snapshot of the current vector list. Later loads do not affect it.
    pub fn vectors(&self) -> Arc<[Arc<SharedVector>]> {
        self.vectors.read().clone()
    }
}

impl Default for SharedMatrix {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that `data` is a non-empty rectangle and returns its shape.
fn validate_shape(data: &[Vec<f64>]) -> ComputeResult<(usize, usize)> {
    let first = data
        .first()
        .ok_or_else(|| ComputeError::InvalidInput("matrix must have at least one row".to_string()))?;
    let cols = first.len();
    if cols == 0 {
        return Err(ComputeError::InvalidInput(
            "matrix must have at least one column".to_string(),
        ));
    }
    if let Some((index, row)) = data.iter().enumerate().find(|(_, row)| row.len() != cols) {
        return Err(ComputeError::InvalidInput(format!(
            "row {} has {} columns, expected {}",
            index,
            row.len(),
            cols
        )));
    }
    Ok((data.len(), cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatrixData {
        vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
    }

    #[test]
    fn test_row_major_load_and_read() {
        let m = SharedMatrix::from_row_major(&sample()).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.orientation(), Ok(Orientation::Row));
        assert_eq!(m.dimensions(), Ok((2, 3)));
        assert_eq!(m.read_row_major().unwrap(), sample());
    }

    #[test]
    fn test_column_major_load_reads_back_row_major() {
        let m = SharedMatrix::new();
        m.load_column_major(&sample()).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.orientation(), Ok(Orientation::Column));
        assert_eq!(m.dimensions(), Ok((2, 3)));
        assert_eq!(m.get(1).unwrap().to_vec(), vec![2.0, 5.0]);
        assert_eq!(m.read_row_major().unwrap(), sample());
    }

    #[test]
    fn test_load_replaces_previous_contents() {
        let m = SharedMatrix::from_row_major(&sample()).unwrap();
        let old_first = m.get(0).unwrap();
        m.load_row_major(&[vec![9.0]]).unwrap();
        assert_eq!(m.read_row_major().unwrap(), vec![vec![9.0]]);
        assert_eq!(old_first.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let m = SharedMatrix::new();
        assert!(matches!(m.load_row_major(&[]), Err(ComputeError::InvalidInput(_))));
        assert!(matches!(m.load_row_major(&[vec![]]), Err(ComputeError::InvalidInput(_))));
        assert!(matches!(
            m.load_column_major(&[vec![1.0, 2.0], vec![3.0]]),
            Err(ComputeError::InvalidInput(_))
        ));
        assert!(m.is_empty());
    }

    #[test]
    fn test_empty_matrix_accessors() {
        let m = SharedMatrix::new();
        assert_eq!(m.orientation(), Err(ComputeError::EmptyMatrix));
        assert_eq!(m.dimensions(), Err(ComputeError::EmptyMatrix));
        assert_eq!(m.read_row_major().unwrap(), MatrixData::new());
        assert!(matches!(m.get(0), Err(ComputeError::OutOfRange { index: 0, len: 0 })));
    }

    #[test]
    fn test_transposing_every_row_reads_as_transpose() {
        let m = SharedMatrix::from_row_major(&sample()).unwrap();
        for v in m.vectors().iter() {
            v.transpose();
        }
        assert_eq!(m.orientation(), Ok(Orientation::Column));
        assert_eq!(
            m.read_row_major().unwrap(),
            vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]
        );
    }
}

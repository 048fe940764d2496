//! # Shared Vector
//!
//! An orientation-tagged sequence of `f64` values behind a reader/writer
//! lock. Row tasks mutate different vectors of the same matrix concurrently,
//! so every operation takes the lock it needs and validates before touching
//! the data: an operation that fails leaves the receiver unchanged.
//!
//! ## Lock Ordering
//! Operations over several vectors (`add`, `dot`, `vec_mat_mul`) acquire
//! their locks in ascending order of the vectors' creation ids, whatever the
//! call direction. Two threads calling `a.add(&b)` and `b.add(&a)` therefore
//! cannot deadlock, nor can `a.add(&b)` racing `b.vec_mat_mul(&m)` with `a`
//! in `m`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lae_api::errors::{ComputeError, ComputeResult};
use lae_api::Orientation;

use super::matrix::SharedMatrix;

static NEXT_VECTOR_ID: AtomicU64 = AtomicU64::new(0);

/// Lock-protected contents of a vector.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VectorData {
    pub(crate) values: Vec<f64>,
    pub(crate) orientation: Orientation,
}

/// A row or column vector that can be shared between row tasks.
pub struct SharedVector {
    /// Creation sequence number, used as the global lock order
    id: u64,

    data: RwLock<VectorData>,
}

impl fmt::Debug for SharedVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("SharedVector")
            .field("id", &self.id)
            .field("orientation", &data.orientation)
            .field("len", &data.values.len())
            .finish()
    }
}

impl SharedVector {
    /// Creates a vector owning `values` with the given orientation.
    pub fn new(values: Vec<f64>, orientation: Orientation) -> Self {
        Self {
            id: NEXT_VECTOR_ID.fetch_add(1, Ordering::Relaxed),
            data: RwLock::new(VectorData { values, orientation }),
        }
    }

    /// Creation sequence id of this vector.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    /// `OutOfRange` if `index` is not in `[0, len)`.
    pub fn get(&self, index: usize) -> ComputeResult<f64> {
        let data = self.data.read();
        data.values
            .get(index)
            .copied()
            .ok_or(ComputeError::OutOfRange { index, len: data.values.len() })
    }

    pub fn len(&self) -> usize {
        self.data.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().values.is_empty()
    }

    pub fn orientation(&self) -> Orientation {
        self.data.read().orientation
    }

    /// Copy of the current values.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.read().values.clone()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, VectorData> {
        self.data.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, VectorData> {
        self.data.write()
    }

    /// Adds `other` element-wise into this vector.
    ///
    /// # Errors
    /// `DimensionMismatch` if the lengths differ.
    pub fn add(&self, other: &SharedVector) -> ComputeResult<()> {
        if self.id == other.id {
            let mut data = self.write();
            data.values.iter_mut().for_each(|v| *v += *v);
            return Ok(());
        }

        let (mut this, that) = if self.id < other.id {
            let this = self.write();
            let that = other.read();
            (this, that)
        } else {
            let that = other.read();
            let this = self.write();
            (this, that)
        };

        if this.values.len() != that.values.len() {
            return Err(ComputeError::DimensionMismatch(format!(
                "cannot add vector of length {} to vector of length {}",
                that.values.len(),
                this.values.len()
            )));
        }

        this.values
            .iter_mut()
            .zip(that.values.iter())
            .for_each(|(acc, v)| *acc += v);
        Ok(())
    }

    /// Negates every element in place.
    pub fn negate(&self) {
        let mut data = self.write();
        data.values.iter_mut().for_each(|v| *v = -*v);
    }

    /// Flips the orientation; values are untouched.
    pub fn transpose(&self) {
        let mut data = self.write();
        data.orientation = data.orientation.flipped();
    }

    /// Dot product of a row and a column of equal length.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the lengths differ
    /// - `OrientationMismatch` if both vectors have the same orientation
    pub fn dot(&self, other: &SharedVector) -> ComputeResult<f64> {
        if self.id == other.id {
            let data = self.read();
            let orientation = data.orientation;
            return Err(ComputeError::OrientationMismatch {
                operation: "dot",
                left: orientation,
                right: Some(orientation),
            });
        }

        let (this, that) = if self.id < other.id {
            let this = self.read();
            let that = other.read();
            (this, that)
        } else {
            let that = other.read();
            let this = self.read();
            (this, that)
        };

        dot_product(&this, &that)
    }

    /// Replaces this row vector with `self × matrix`.
    ///
    /// A length-n row vector times an n×m matrix yields a length-m row
    /// vector, so this is the one operation that can change the length. The
    /// write lock is held throughout and the contents are swapped only once
    /// the whole result has been computed.
    ///
    /// The operand matrix must not be mutated concurrently.
    ///
    /// # Errors
    /// - `OrientationMismatch` if this vector is not a row
    /// - `EmptyMatrix` if the matrix has nothing loaded
    /// - `DimensionMismatch` if this length differs from the matrix row count
    pub fn vec_mat_mul(&self, matrix: &SharedMatrix) -> ComputeResult<()> {
        let vectors = matrix.vectors();

        let mut order: Vec<usize> = (0..vectors.len()).collect();
        order.sort_by_key(|&i| vectors[i].id);

        // Acquire in id order; the receiver takes its write lock at its place
        let mut receiver_guard = None;
        let mut guards: Vec<RwLockReadGuard<'_, VectorData>> = Vec::with_capacity(vectors.len());
        let mut slots: Vec<Option<usize>> = vec![None; vectors.len()];
        let mut last: Option<(u64, usize)> = None;
        for i in order {
            let vector = &vectors[i];
            if vector.id == self.id {
                continue;
            }
            if receiver_guard.is_none() && vector.id > self.id {
                receiver_guard = Some(self.write());
            }
            match last {
                Some((id, slot)) if id == vector.id => slots[i] = Some(slot),
                _ => {
                    guards.push(vector.read());
                    slots[i] = Some(guards.len() - 1);
                    last = Some((vector.id, guards.len() - 1));
                }
            }
        }
        let mut this = receiver_guard.unwrap_or_else(|| self.write());

        let result = multiply_locked(&this, &slots, &guards)?;
        this.values = result;
        Ok(())
    }
}

/// Operand `i` of a locked matrix: its read guard, or the receiver itself.
fn operand<'a>(
    receiver: &'a VectorData,
    slots: &[Option<usize>],
    guards: &'a [RwLockReadGuard<'_, VectorData>],
    i: usize,
) -> &'a VectorData {
    match slots[i] {
        Some(slot) => &*guards[slot],
        None => receiver,
    }
}

/// `receiver × matrix` over already-locked contents.
fn multiply_locked(
    receiver: &VectorData,
    slots: &[Option<usize>],
    guards: &[RwLockReadGuard<'_, VectorData>],
) -> ComputeResult<Vec<f64>> {
    if receiver.orientation != Orientation::Row {
        return Err(ComputeError::OrientationMismatch {
            operation: "vec_mat_mul",
            left: receiver.orientation,
            right: None,
        });
    }
    if slots.is_empty() {
        return Err(ComputeError::EmptyMatrix);
    }

    let first = operand(receiver, slots, guards, 0);
    let (rows, cols) = match first.orientation {
        Orientation::Row => (slots.len(), first.values.len()),
        Orientation::Column => (first.values.len(), slots.len()),
    };

    if receiver.values.len() != rows {
        return Err(ComputeError::DimensionMismatch(format!(
            "row vector of length {} cannot multiply a {}x{} matrix",
            receiver.values.len(),
            rows,
            cols
        )));
    }

    match first.orientation {
        Orientation::Column => (0..slots.len())
            .map(|i| dot_product(receiver, operand(receiver, slots, guards, i)))
            .collect(),
        Orientation::Row => {
            let mut result = vec![0.0; cols];
            for j in 0..slots.len() {
                let scale = receiver.values[j];
                let row_values = &operand(receiver, slots, guards, j).values;
                if row_values.len() != cols {
                    return Err(ComputeError::DimensionMismatch(format!(
                        "matrix row {} has length {}, expected {}",
                        j,
                        row_values.len(),
                        cols
                    )));
                }
                result
                    .iter_mut()
                    .zip(row_values.iter())
                    .for_each(|(acc, v)| *acc += scale * v);
            }
            Ok(result)
        }
    }
}

/// Dot product over already-locked contents.
fn dot_product(left: &VectorData, right: &VectorData) -> ComputeResult<f64> {
    if left.values.len() != right.values.len() {
        return Err(ComputeError::DimensionMismatch(format!(
            "dot product of vectors with lengths {} and {}",
            left.values.len(),
            right.values.len()
        )));
    }
    if left.orientation == right.orientation {
        return Err(ComputeError::OrientationMismatch {
            operation: "dot",
            left: left.orientation,
            right: Some(right.orientation),
        });
    }

    Ok(left
        .values
        .iter()
        .zip(right.values.iter())
        .map(|(a, b)| a * b)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[f64]) -> SharedVector {
        SharedVector::new(values.to_vec(), Orientation::Row)
    }

    fn column(values: &[f64]) -> SharedVector {
        SharedVector::new(values.to_vec(), Orientation::Column)
    }

    #[test]
    fn test_get_checks_bounds() {
        let v = row(&[1.0, 2.0]);
        assert_eq!(v.get(1), Ok(2.0));
        assert_eq!(v.get(2), Err(ComputeError::OutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = row(&[1.0]);
        let b = row(&[1.0]);
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_add_in_both_directions() {
        let a = row(&[1.0, 2.0]);
        let b = row(&[10.0, 20.0]);
        a.add(&b).unwrap();
        assert_eq!(a.to_vec(), vec![11.0, 22.0]);
        b.add(&a).unwrap();
        assert_eq!(b.to_vec(), vec![21.0, 42.0]);
    }

    #[test]
    fn test_add_to_itself_doubles() {
        let a = row(&[1.5, -2.0]);
        a.add(&a).unwrap();
        assert_eq!(a.to_vec(), vec![3.0, -4.0]);
    }

    #[test]
    fn test_add_length_mismatch_leaves_receiver() {
        let a = row(&[1.0, 2.0]);
        let b = row(&[1.0, 2.0, 3.0]);
        assert!(matches!(a.add(&b), Err(ComputeError::DimensionMismatch(_))));
        assert_eq!(a.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_negate_and_transpose() {
        let a = row(&[1.0, -2.0]);
        a.negate();
        assert_eq!(a.to_vec(), vec![-1.0, 2.0]);
        a.transpose();
        assert_eq!(a.orientation(), Orientation::Column);
        assert_eq!(a.to_vec(), vec![-1.0, 2.0]);
        a.transpose();
        assert_eq!(a.orientation(), Orientation::Row);
    }

    #[test]
    fn test_dot_requires_opposite_orientation() {
        let r = row(&[1.0, 2.0, 3.0]);
        let c = column(&[4.0, 5.0, 6.0]);
        assert_eq!(r.dot(&c), Ok(32.0));
        assert_eq!(c.dot(&r), Ok(32.0));

        let other_row = row(&[1.0, 1.0, 1.0]);
        assert!(matches!(r.dot(&other_row), Err(ComputeError::OrientationMismatch { .. })));
        assert!(matches!(r.dot(&r), Err(ComputeError::OrientationMismatch { .. })));
    }

    #[test]
    fn test_dot_requires_equal_length() {
        let r = row(&[1.0, 2.0]);
        let c = column(&[1.0, 2.0, 3.0]);
        assert!(matches!(r.dot(&c), Err(ComputeError::DimensionMismatch(_))));
    }

    #[test]
    fn test_vec_mat_mul_row_major_operand() {
        let v = row(&[1.0, 2.0]);
        let m = SharedMatrix::from_row_major(&[vec![2.0, 0.0, 1.0], vec![1.0, 2.0, 0.0]]).unwrap();
        v.vec_mat_mul(&m).unwrap();
        assert_eq!(v.to_vec(), vec![4.0, 4.0, 1.0]);
        assert_eq!(v.orientation(), Orientation::Row);
    }

    #[test]
    fn test_vec_mat_mul_column_major_operand() {
        let v = row(&[1.0, 2.0]);
        let m = SharedMatrix::new();
        m.load_column_major(&[vec![2.0, 0.0, 1.0], vec![1.0, 2.0, 0.0]]).unwrap();
        v.vec_mat_mul(&m).unwrap();
        assert_eq!(v.to_vec(), vec![4.0, 4.0, 1.0]);
    }

    #[test]
    fn test_vec_mat_mul_can_shrink() {
        let v = row(&[1.0, 1.0, 1.0]);
        let m = SharedMatrix::from_row_major(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        v.vec_mat_mul(&m).unwrap();
        assert_eq!(v.to_vec(), vec![6.0]);
    }

    #[test]
    fn test_vec_mat_mul_rejects_column_receiver() {
        let v = column(&[1.0, 2.0]);
        let m = SharedMatrix::from_row_major(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(matches!(v.vec_mat_mul(&m), Err(ComputeError::OrientationMismatch { .. })));
        assert_eq!(v.to_vec(), vec![1.0, 2.0]);
        assert_eq!(v.orientation(), Orientation::Column);
    }

    #[test]
    fn test_vec_mat_mul_rejects_wrong_length() {
        let v = row(&[1.0, 2.0, 3.0]);
        let m = SharedMatrix::from_row_major(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(matches!(v.vec_mat_mul(&m), Err(ComputeError::DimensionMismatch(_))));
        assert_eq!(v.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vec_mat_mul_on_empty_matrix() {
        let v = row(&[1.0]);
        assert_eq!(v.vec_mat_mul(&SharedMatrix::new()), Err(ComputeError::EmptyMatrix));
    }
}

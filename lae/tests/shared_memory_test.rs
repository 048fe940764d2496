#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use lae::{SharedMatrix, SharedVector};
    use lae_api::{ComputeError, Orientation};

    fn row(values: &[f64]) -> SharedVector {
        SharedVector::new(values.to_vec(), Orientation::Row)
    }

    fn column(values: &[f64]) -> SharedVector {
        SharedVector::new(values.to_vec(), Orientation::Column)
    }

    #[test]
    fn test_add_requires_equal_length() {
        let a = row(&[1.0, 2.0]);
        let b = row(&[1.0, 2.0, 3.0]);
        assert!(matches!(a.add(&b), Err(ComputeError::DimensionMismatch(_))));
        assert_eq!(a.to_vec(), vec![1.0, 2.0]);

        a.add(&row(&[10.0, 20.0])).unwrap();
        assert_eq!(a.to_vec(), vec![11.0, 22.0]);
    }

    #[test]
    fn test_add_to_itself_doubles() {
        let a = row(&[1.5, -2.0]);
        a.add(&a).unwrap();
        assert_eq!(a.to_vec(), vec![3.0, -4.0]);
    }

    #[test]
    fn test_dot_of_two_rows_is_orientation_mismatch() {
        let a = row(&[1.0, 2.0]);
        let b = row(&[3.0, 4.0]);
        assert_eq!(
            a.dot(&b),
            Err(ComputeError::OrientationMismatch {
                operation: "dot",
                left: Orientation::Row,
                right: Some(Orientation::Row),
            })
        );
    }

    #[test]
    fn test_dot_of_row_and_column() {
        let a = row(&[1.0, 2.0, 3.0]);
        let b = column(&[4.0, 5.0, 6.0]);
        assert_eq!(a.dot(&b), Ok(32.0));
        assert_eq!(b.dot(&a), Ok(32.0));
        assert!(matches!(a.dot(&column(&[1.0])), Err(ComputeError::DimensionMismatch(_))));
    }

    #[test]
    fn test_transpose_twice_restores_orientation() {
        let a = row(&[1.0, 2.0]);
        a.transpose();
        assert_eq!(a.orientation(), Orientation::Column);
        a.transpose();
        assert_eq!(a.orientation(), Orientation::Row);
        assert_eq!(a.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_get_out_of_range() {
        let a = row(&[1.0]);
        assert_eq!(a.get(0), Ok(1.0));
        assert_eq!(a.get(1), Err(ComputeError::OutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn test_vec_mat_mul_changes_length() {
        let matrix = SharedMatrix::from_row_major(&[
            vec![1.0, 0.0, 2.0],
            vec![0.0, 1.0, 3.0],
        ])
        .unwrap();
        let v = row(&[2.0, 5.0]);
        v.vec_mat_mul(&matrix).unwrap();
        assert_eq!(v.to_vec(), vec![2.0, 5.0, 19.0]);
        assert_eq!(v.orientation(), Orientation::Row);
    }

    #[test]
    fn test_vec_mat_mul_failures_leave_receiver_unchanged() {
        let matrix = SharedMatrix::from_row_major(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();

        let wrong_length = row(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            wrong_length.vec_mat_mul(&matrix),
            Err(ComputeError::DimensionMismatch(_))
        ));
        assert_eq!(wrong_length.to_vec(), vec![1.0, 2.0, 3.0]);

        let not_a_row = column(&[1.0, 2.0]);
        assert!(matches!(
            not_a_row.vec_mat_mul(&matrix),
            Err(ComputeError::OrientationMismatch { .. })
        ));
        assert_eq!(not_a_row.to_vec(), vec![1.0, 2.0]);

        let empty = SharedMatrix::new();
        assert_eq!(row(&[1.0]).vec_mat_mul(&empty), Err(ComputeError::EmptyMatrix));
    }

    #[test]
    fn test_concurrent_adds_into_one_vector() {
        let target = Arc::new(row(&[0.0; 8]));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let target = Arc::clone(&target);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let ones = row(&[1.0; 8]);
                    barrier.wait();
                    for _ in 0..100 {
                        target.add(&ones).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(target.to_vec(), vec![800.0; 8]);
    }

    #[test]
    fn test_symmetric_adds_do_not_deadlock() {
        let a = Arc::new(row(&[0.0; 4]));
        let b = Arc::new(row(&[0.0; 4]));
        let barrier = Arc::new(Barrier::new(2));

        let spawn = |receiver: Arc<SharedVector>, operand: Arc<SharedVector>| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..2_000 {
                    receiver.add(&operand).unwrap();
                }
            })
        };
        let first = spawn(Arc::clone(&a), Arc::clone(&b));
        let second = spawn(Arc::clone(&b), Arc::clone(&a));
        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(a.to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_add_racing_vec_mat_mul_does_not_deadlock() {
        let matrix = Arc::new(SharedMatrix::from_row_major(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap());
        let a = matrix.get(0).unwrap();
        let b = Arc::new(row(&[0.0, 0.0]));
        assert!(a.id() < b.id());

        let (done, finished) = mpsc::channel();
        let adder = {
            let (a, b, done) = (Arc::clone(&a), Arc::clone(&b), done.clone());
            thread::spawn(move || {
                for _ in 0..50_000 {
                    a.add(&b).unwrap();
                }
                done.send(()).unwrap();
            })
        };
        let multiplier = {
            let (b, matrix) = (Arc::clone(&b), Arc::clone(&matrix));
            thread::spawn(move || {
                for _ in 0..50_000 {
                    b.vec_mat_mul(&matrix).unwrap();
                }
                done.send(()).unwrap();
            })
        };

        for _ in 0..2 {
            assert!(
                finished.recv_timeout(Duration::from_secs(10)).is_ok(),
                "add and vec_mat_mul deadlocked"
            );
        }
        adder.join().unwrap();
        multiplier.join().unwrap();
        assert_eq!(b.to_vec(), vec![0.0, 0.0]);
        assert_eq!(a.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_vec_mat_mul_with_receiver_inside_matrix() {
        let matrix = SharedMatrix::from_row_major(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let first = matrix.get(0).unwrap();
        first.vec_mat_mul(&matrix).unwrap();
        assert_eq!(first.to_vec(), vec![7.0, 10.0]);
    }

    #[test]
    fn test_read_row_major_is_consistent_during_reloads() {
        let matrix = Arc::new(SharedMatrix::from_row_major(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap());
        let loader = {
            let matrix = Arc::clone(&matrix);
            thread::spawn(move || {
                for i in 0..200 {
                    let v = i as f64;
                    matrix.load_row_major(&[vec![v, v], vec![v, v]]).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snapshot = matrix.read_row_major().unwrap();
            let first = snapshot[0][0];
            assert!(snapshot.iter().flatten().all(|x| *x == first));
        }
        loader.join().unwrap();
    }
}

//! Null-space extraction
//!
//! Orthonormal bases of `{x : A x = 0}` from the right singular vectors of
//! `A` whose singular value falls below a threshold.

use nalgebra::DMatrix;
use tracing::debug;

use crate::error::{Result, SteerableError};

/// Default singular-value threshold
pub const DEFAULT_EPS: f64 = 1e-10;

/// Orthonormal basis of the kernel of `a`
///
/// Returns a matrix whose rows are the basis vectors, i.e. shape
/// `(k, a.ncols())`. `k == 0` when no singular value is below `eps`.
/// Wide matrices are padded with zero rows first so that every right
/// singular vector is available; padding does not change the kernel.
pub fn get_matrix_kernel(a: &DMatrix<f64>, eps: f64) -> Result<DMatrix<f64>> {
    let (rows, cols) = a.shape();
    if cols == 0 {
        return Ok(DMatrix::zeros(0, 0));
    }

    let square;
    let a = if rows < cols {
        let mut padded = DMatrix::zeros(cols, cols);
        padded.rows_mut(0, rows).copy_from(a);
        square = padded;
        &square
    } else {
        a
    };

    let svd = nalgebra::linalg::SVD::try_new(a.clone(), false, true, f64::EPSILON, 0)
        .ok_or_else(|| SteerableError::svd_failure(rows, cols))?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| SteerableError::svd_failure(rows, cols))?;

    let selected: Vec<usize> = svd
        .singular_values
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s < eps)
        .map(|(i, _)| i)
        .collect();

    debug!(
        rows,
        cols,
        kernel_dim = selected.len(),
        "extracted matrix kernel"
    );

    Ok(v_t.select_rows(selected.iter()))
}

/// Common kernel of all matrices in `matrices`
///
/// The matrices are stacked along rows; they must share a column count.
pub fn get_matrices_kernel(matrices: &[DMatrix<f64>], eps: f64) -> Result<DMatrix<f64>> {
    let Some(first) = matrices.first() else {
        return Err(SteerableError::invalid_parameter(
            "matrices",
            "at least one constraint matrix is required",
        ));
    };
    let cols = first.ncols();
    if let Some(bad) = matrices.iter().find(|m| m.ncols() != cols) {
        return Err(SteerableError::dimension_mismatch(
            "stacked constraint columns",
            cols,
            bad.ncols(),
        ));
    }

    let total_rows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let mut stacked = DMatrix::zeros(total_rows, cols);
    let mut offset = 0;
    for m in matrices {
        stacked.rows_mut(offset, m.nrows()).copy_from(m);
        offset += m.nrows();
    }

    get_matrix_kernel(&stacked, eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn assert_orthonormal_kernel(a: &DMatrix<f64>, kernel: &DMatrix<f64>, eps: f64) {
        let k = kernel.nrows();
        let gram = kernel * kernel.transpose();
        assert_relative_eq!(gram, DMatrix::identity(k, k), epsilon = 1e-10);
        for i in 0..k {
            let x = kernel.row(i).transpose();
            assert!((a * x).norm() < eps.max(1e-9));
        }
    }

    #[test]
    fn test_full_rank_square_has_empty_kernel() {
        let a = DMatrix::from_row_slice(3, 3, &[2.0, 0.0, 1.0, 0.0, 3.0, 0.0, 1.0, 0.0, 4.0]);
        let kernel = get_matrix_kernel(&a, DEFAULT_EPS).unwrap();
        assert_eq!(kernel.nrows(), 0);
        assert_eq!(kernel.ncols(), 3);
    }

    #[test]
    fn test_rank_deficient_kernel() {
        // Third column is the sum of the first two
        let a = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
        let kernel = get_matrix_kernel(&a, 1e-8).unwrap();
        assert_eq!(kernel.nrows(), 1);
        assert_orthonormal_kernel(&a, &kernel, 1e-8);
    }

    #[test]
    fn test_wide_matrix_kernel() {
        let a = DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
        let kernel = get_matrix_kernel(&a, DEFAULT_EPS).unwrap();
        assert_eq!(kernel.nrows(), 2);
        assert_orthonormal_kernel(&a, &kernel, DEFAULT_EPS);
    }

    #[test]
    fn test_common_kernel_of_stack() {
        let a = DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(1, 3, &[0.0, 1.0, 0.0]);
        let kernel = get_matrices_kernel(&[a, b], DEFAULT_EPS).unwrap();
        assert_eq!(kernel.nrows(), 1);
        assert_relative_eq!(kernel[(0, 2)].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stack_rejects_mismatched_columns() {
        let a = DMatrix::<f64>::zeros(2, 3);
        let b = DMatrix::<f64>::zeros(2, 4);
        assert!(matches!(
            get_matrices_kernel(&[a, b], DEFAULT_EPS),
            Err(SteerableError::DimensionMismatch { .. })
        ));
        assert!(get_matrices_kernel(&[], DEFAULT_EPS).is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = DMatrix::from_fn(6, 4, |i, j| ((i * 7 + j * 3) % 5) as f64 - 2.0);
        let first = get_matrix_kernel(&a, 1e-8).unwrap();
        let second = get_matrix_kernel(&a, 1e-8).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_kernel_rows_are_orthonormal(
            entries in proptest::collection::vec(-1.0f64..1.0, 12),
            rank_drop in 0usize..3,
        ) {
            // 4x3 matrix with `rank_drop` columns forced to be copies of column 0
            let mut a = DMatrix::from_row_slice(4, 3, &entries);
            for c in 1..=rank_drop.min(2) {
                let col0 = a.column(0).clone_owned();
                a.set_column(c, &col0);
            }
            let kernel = get_matrix_kernel(&a, 1e-9).unwrap();
            let k = kernel.nrows();
            let gram = &kernel * kernel.transpose();
            prop_assert!((gram - DMatrix::identity(k, k)).amax() < 1e-9);
            for i in 0..k {
                let x = kernel.row(i).transpose();
                prop_assert!((&a * x).norm() < 1e-8);
            }
        }
    }
}

//! Numerical utility functions

use nalgebra::DMatrix;
use ndarray::Array2;

/// Largest violation of `|a - b| <= atol + rtol * |b|` over paired elements
///
/// Returns `0.0` when every pair is within tolerance, otherwise the largest
/// absolute difference among the offending pairs.
pub fn allclose_violation<'a, I>(pairs: I, rtol: f64, atol: f64) -> f64
where
    I: IntoIterator<Item = (&'a f64, &'a f64)>,
{
    pairs
        .into_iter()
        .filter_map(|(&a, &b)| {
            let diff = (a - b).abs();
            if diff <= atol + rtol * b.abs() {
                None
            } else {
                Some(if diff.is_nan() { f64::INFINITY } else { diff })
            }
        })
        .fold(0.0, f64::max)
}

/// Element-wise `allclose` over paired elements
#[inline]
pub fn allclose<'a, I>(pairs: I, rtol: f64, atol: f64) -> bool
where
    I: IntoIterator<Item = (&'a f64, &'a f64)>,
{
    allclose_violation(pairs, rtol, atol) == 0.0
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Centred voxel coordinates `i - (size - 1) / 2` for `i in 0..size`
#[inline]
pub fn centered_coordinates(size: usize) -> Vec<f64> {
    let half = (size as f64 - 1.0) / 2.0;
    (0..size).map(|i| i as f64 - half).collect()
}

/// Euclidean norm of a sequence
#[inline]
pub fn norm<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    values.into_iter().map(|&v| v * v).sum::<f64>().sqrt()
}

/// Copy a nalgebra matrix into an ndarray one
pub fn dmatrix_to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allclose() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0 + 1e-9, 3.0];
        assert!(allclose(a.iter().zip(b.iter()), 1e-5, 1e-8));

        let c = [1.0, 2.1, 3.0];
        let v = allclose_violation(a.iter().zip(c.iter()), 1e-5, 1e-8);
        assert!((v - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_allclose_nan_is_violation() {
        let a = [f64::NAN];
        let b = [0.0];
        assert_eq!(allclose_violation(a.iter().zip(b.iter()), 1e-5, 1e-8), f64::INFINITY);
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 4.0, 5), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_centered_coordinates() {
        assert_eq!(centered_coordinates(3), vec![-1.0, 0.0, 1.0]);
        assert_eq!(centered_coordinates(4), vec![-1.5, -0.5, 0.5, 1.5]);
    }

    #[test]
    fn test_dmatrix_to_array2() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let a = dmatrix_to_array2(&m);
        assert_eq!(a.dim(), (2, 3));
        assert_eq!(a[[1, 0]], 4.0);
        assert_eq!(a[[0, 2]], 3.0);
    }

    #[test]
    fn test_norm() {
        assert_eq!(norm(&[3.0, 4.0]), 5.0);
    }
}

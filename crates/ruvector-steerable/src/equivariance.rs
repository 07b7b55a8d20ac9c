//! Equivariance verification
//!
//! A kernel `K` is equivariant when
//!
//! ```text
//! D_out(u) K(u^-1 x) D_in(u^-1) = K(x)    for all rotations u
//! ```
//!
//! [`check_basis_equivariance`] measures this for an arbitrary rotation by
//! resampling every channel on the rotated grid; [`check_quarter_turn`] is
//! the exact discrete version for a quarter turn about `y`, where the
//! rotated grid coincides with the original one.

use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array2, Array3, Array5, Array6, ArrayView3, ArrayView5, Axis};
use std::borrow::Cow;
use std::f64::consts::FRAC_PI_2;

use crate::error::{Result, SteerableError};
use crate::so3::{irr_repr, rep_dim, rot};
use crate::utils::{allclose_violation, centered_coordinates, dmatrix_to_array2, norm};

/// Catmull-Rom weights of the taps at offsets `-1, 0, 1, 2` for fraction `t`
#[inline]
fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}

/// Tricubic resampler of cubic volumes under a fixed rotation about the
/// grid centre.
///
/// Output voxel `p` reads the source at `inverse_rotation * p` (centred
/// coordinates) through separable Catmull-Rom interpolation. Samples
/// outside the grid are zero. The 4x4x4 tap table is built once and
/// reused for every volume.
#[derive(Debug, Clone)]
pub struct RotationResampler {
    size: usize,
    starts: Vec<usize>,
    taps: Vec<(usize, f64)>,
}

impl RotationResampler {
    /// Build the tap table for grids of side `size`
    pub fn new(size: usize, inverse_rotation: &Matrix3<f64>) -> Self {
        let coords = centered_coordinates(size);
        let half = (size as f64 - 1.0) / 2.0;
        let n = size * size * size;
        let mut starts = Vec::with_capacity(n + 1);
        let mut taps = Vec::with_capacity(n * 8);

        let axis_taps = |f: f64| -> ([Option<usize>; 4], [f64; 4]) {
            let base = f.floor();
            let weights = catmull_rom_weights(f - base);
            let mut index = [None; 4];
            for (o, slot) in index.iter_mut().enumerate() {
                let i = base as i64 - 1 + o as i64;
                if i >= 0 && (i as usize) < size {
                    *slot = Some(i as usize);
                }
            }
            (index, weights)
        };

        for &x in &coords {
            for &y in &coords {
                for &z in &coords {
                    starts.push(taps.len());
                    let q = inverse_rotation * Vector3::new(x, y, z);
                    let (ix, wx) = axis_taps(q.x + half);
                    let (iy, wy) = axis_taps(q.y + half);
                    let (iz, wz) = axis_taps(q.z + half);

                    for a in 0..4 {
                        let Some(i) = ix[a] else { continue };
                        for b in 0..4 {
                            let Some(j) = iy[b] else { continue };
                            let wab = wx[a] * wy[b];
                            for c in 0..4 {
                                let Some(k) = iz[c] else { continue };
                                let w = wab * wz[c];
                                if w != 0.0 {
                                    taps.push(((i * size + j) * size + k, w));
                                }
                            }
                        }
                    }
                }
            }
        }
        starts.push(taps.len());

        Self { size, starts, taps }
    }

    /// Grid side length
    pub fn size(&self) -> usize {
        self.size
    }

    /// Resample one volume
    pub fn apply(&self, volume: ArrayView3<f64>) -> Result<Array3<f64>> {
        let s = self.size;
        if volume.shape() != [s, s, s] {
            return Err(SteerableError::dimension_mismatch(
                "resampled volume side",
                s,
                volume.shape()[0],
            ));
        }
        let data: Cow<[f64]> = match volume.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(volume.iter().copied().collect()),
        };

        let out: Vec<f64> = self
            .starts
            .windows(2)
            .map(|w| {
                self.taps[w[0]..w[1]]
                    .iter()
                    .map(|&(idx, weight)| data[idx] * weight)
                    .sum()
            })
            .collect();
        Ok(Array3::from_shape_vec((s, s, s), out)?)
    }
}

/// Resample `volume` under the rotation whose inverse is `inverse_rotation`
pub fn resample_rotated(
    volume: &Array3<f64>,
    inverse_rotation: &Matrix3<f64>,
) -> Result<Array3<f64>> {
    let size = volume.shape()[0];
    RotationResampler::new(size, inverse_rotation).apply(volume.view())
}

/// `out[a, d, ..] = sum_{b, c} left[a, b] k[b, c, ..] right[c, d]`
pub(crate) fn apply_channel_representations(
    k: ArrayView5<f64>,
    left: &Array2<f64>,
    right: &Array2<f64>,
) -> Result<Array5<f64>> {
    let (dim_out, dim_in) = (k.shape()[0], k.shape()[1]);
    if left.ncols() != dim_out {
        return Err(SteerableError::dimension_mismatch(
            "output representation",
            dim_out,
            left.ncols(),
        ));
    }
    if right.nrows() != dim_in {
        return Err(SteerableError::dimension_mismatch(
            "input representation",
            dim_in,
            right.nrows(),
        ));
    }

    let spatial = [k.shape()[2], k.shape()[3], k.shape()[4]];
    let n: usize = spatial.iter().product();

    let flat = Array2::from_shape_vec((dim_out, dim_in * n), k.iter().copied().collect())?;
    let left_applied = left.dot(&flat);
    let rows = left.nrows();
    let cols = right.ncols();
    let left3 = Array3::from_shape_vec((rows, dim_in, n), left_applied.iter().copied().collect())?;

    let mut out = Array3::zeros((rows, cols, n));
    for (a, slab) in left3.outer_iter().enumerate() {
        out.index_axis_mut(Axis(0), a).assign(&right.t().dot(&slab));
    }

    Ok(Array5::from_shape_vec(
        (rows, cols, spatial[0], spatial[1], spatial[2]),
        out.into_raw_vec(),
    )?)
}

/// Exact equivariance check of one raw cube under a quarter turn about `y`
///
/// `u = rot(0, pi/2, 0)` maps grid points onto grid points, so
/// `K(u^-1 x)` is a pure index permutation:
/// `K(u^-1 x)[.., i, j, k] = K[.., size - 1 - k, j, i]`.
pub fn check_quarter_turn(
    k: &Array5<f64>,
    order_in: usize,
    order_out: usize,
    rtol: f64,
    atol: f64,
) -> Result<()> {
    let shape = k.shape();
    if shape[0] != rep_dim(order_out) || shape[1] != rep_dim(order_in) {
        return Err(SteerableError::dimension_mismatch(
            "quarter-turn channels",
            rep_dim(order_out) * rep_dim(order_in),
            shape[0] * shape[1],
        ));
    }
    let size = shape[4];

    let permuted = Array5::from_shape_fn(k.raw_dim(), |(a, b, i, j, l)| {
        k[[a, b, size - 1 - l, j, i]]
    });
    let d_out = dmatrix_to_array2(&irr_repr(order_out, 0.0, FRAC_PI_2, 0.0));
    let d_in_inv = dmatrix_to_array2(&irr_repr(order_in, 0.0, -FRAC_PI_2, 0.0));
    let rotated = apply_channel_representations(permuted.view(), &d_out, &d_in_inv)?;

    let deviation = allclose_violation(rotated.iter().zip(k.iter()), rtol, atol);
    if deviation > 0.0 {
        return Err(SteerableError::equivariance_violation(
            format!("quarter-turn check (in={order_in}, out={order_out})"),
            deviation,
        ));
    }
    Ok(())
}

/// Overlap of each normalized basis element with its rotated-back image
///
/// `basis` has shape `(N, 2 order_out + 1, 2 order_in + 1, size, size, size)`.
/// The rotation is given by ZYZ Euler angles. Values near `1.0` certify
/// equivariance. Elements with zero or non-finite norm are rejected.
pub fn check_basis_equivariance(
    basis: &Array6<f64>,
    order_in: usize,
    order_out: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> Result<Vec<f64>> {
    let shape = basis.shape();
    let (n, size) = (shape[0], shape[5]);
    let expected = [n, rep_dim(order_out), rep_dim(order_in), size, size, size];
    if let Some(axis) = (0..6).find(|&a| shape[a] != expected[a]) {
        return Err(SteerableError::dimension_mismatch(
            format!("basis axis {axis}"),
            expected[axis],
            shape[axis],
        ));
    }

    let mut normalized = basis.clone();
    for (index, mut element) in normalized.outer_iter_mut().enumerate() {
        let norm = norm(element.iter());
        if norm == 0.0 || !norm.is_finite() {
            return Err(SteerableError::ZeroEnergy { index });
        }
        element /= norm;
    }

    let resampler = RotationResampler::new(size, &rot(-gamma, -beta, -alpha));
    let mut rotated = Array6::<f64>::zeros(basis.raw_dim());
    for b in 0..n {
        for i in 0..expected[1] {
            for k in 0..expected[2] {
                let volume = resampler.apply(normalized.slice(s![b, i, k, .., .., ..]))?;
                rotated.slice_mut(s![b, i, k, .., .., ..]).assign(&volume);
            }
        }
    }

    let d_out = dmatrix_to_array2(&irr_repr(order_out, alpha, beta, gamma));
    let d_in_inv = dmatrix_to_array2(&irr_repr(order_in, -gamma, -beta, -alpha));

    normalized
        .outer_iter()
        .zip(rotated.outer_iter())
        .map(|(original, moved)| -> Result<f64> {
            let back = apply_channel_representations(moved, &d_out, &d_in_inv)?;
            Ok(original.iter().zip(back.iter()).map(|(a, b)| a * b).sum())
        })
        .collect()
}

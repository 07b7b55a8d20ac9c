//! Spherical harmonics sampled on a cubic voxel grid
//!
//! Voxel `(i, j, k)` sits at centred coordinates `(c_i, c_j, c_k)` with
//! `c_i = i - (size - 1) / 2`. No bandlimiting is applied here; aliased
//! frequencies must be removed by a radial window.

use nalgebra::Vector3;
use ndarray::{Array3, Array4};
use std::f64::consts::PI;

use crate::error::{Result, SteerableError};
use crate::so3::{rep_dim, spherical_harmonics, x_to_alpha_beta};
use crate::utils::centered_coordinates;

fn check_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(SteerableError::invalid_parameter("size", "must be >= 1"));
    }
    Ok(())
}

/// Harmonics of order `j` at every voxel, shape `(2j + 1, size, size, size)`
///
/// The centre voxel of an odd-sized grid has no direction: it holds
/// `1 / sqrt(4 pi)` for `j == 0` and zeros otherwise.
pub fn sample_sh_cube(size: usize, j: usize) -> Result<Array4<f64>> {
    check_size(size)?;
    let coords = centered_coordinates(size);
    let mut cube = Array4::zeros((rep_dim(j), size, size, size));

    for (ix, &x) in coords.iter().enumerate() {
        for (iy, &y) in coords.iter().enumerate() {
            for (iz, &z) in coords.iter().enumerate() {
                if x == 0.0 && y == 0.0 && z == 0.0 {
                    if j == 0 {
                        cube[[0, ix, iy, iz]] = 1.0 / (4.0 * PI).sqrt();
                    }
                    continue;
                }
                let (alpha, beta) = x_to_alpha_beta(&Vector3::new(x, y, z))?;
                let y_j = spherical_harmonics(j, alpha, beta);
                for (m, &value) in y_j.iter().enumerate() {
                    cube[[m, ix, iy, iz]] = value;
                }
            }
        }
    }

    Ok(cube)
}

/// Distance of every voxel from the grid centre, shape `(size, size, size)`
pub fn radial_field(size: usize) -> Result<Array3<f64>> {
    check_size(size)?;
    let coords = centered_coordinates(size);
    Ok(Array3::from_shape_fn((size, size, size), |(i, j, k)| {
        (coords[i] * coords[i] + coords[j] * coords[j] + coords[k] * coords[k]).sqrt()
    }))
}

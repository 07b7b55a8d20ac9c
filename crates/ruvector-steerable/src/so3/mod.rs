//! SO(3) primitives
//!
//! Rotation matrices, angle conversion, Kronecker products, real spherical
//! harmonics and the real irreducible representation matrices they
//! transform under.
//!
//! ## Conventions
//!
//! - Rotations use the ZYZ Euler convention:
//!   `rot(alpha, beta, gamma) = Rz(alpha) Ry(beta) Rz(gamma)`.
//! - `beta` is the polar angle measured from +z, `alpha` the azimuth.
//! - Representation matrices satisfy `Y(u x) = D(u) Y(x)` for the real
//!   orthonormal harmonics `Y` of the same order, so `D` is orthogonal and
//!   `D(uv) = D(u) D(v)`.

mod harmonics;
mod wigner;

pub use harmonics::{associated_legendre_normalized, spherical_harmonics, spherical_harmonics_xyz};
pub use wigner::{gauss_legendre, irr_repr, wigner_d};

use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::error::{Result, SteerableError};

/// Dimension `2 * order + 1` of the irreducible representation of `order`
#[inline]
pub const fn rep_dim(order: usize) -> usize {
    2 * order + 1
}

/// Rotation about the z axis
pub fn rot_z(gamma: f64) -> Matrix3<f64> {
    let (s, c) = gamma.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Rotation about the y axis
pub fn rot_y(beta: f64) -> Matrix3<f64> {
    let (s, c) = beta.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

/// ZYZ Euler rotation `Rz(alpha) Ry(beta) Rz(gamma)`
pub fn rot(alpha: f64, beta: f64, gamma: f64) -> Matrix3<f64> {
    rot_z(alpha) * rot_y(beta) * rot_z(gamma)
}

/// Polar angles of a non-zero vector: returns `(alpha, beta)`
///
/// `alpha = atan2(y, x)` in `(-pi, pi]`, `beta = acos(z / |x|)` in `[0, pi]`.
pub fn x_to_alpha_beta(x: &Vector3<f64>) -> Result<(f64, f64)> {
    let r = x.norm();
    if r == 0.0 || !r.is_finite() {
        return Err(SteerableError::invalid_parameter(
            "x",
            "direction of a zero or non-finite vector is undefined",
        ));
    }
    let beta = (x.z / r).clamp(-1.0, 1.0).acos();
    let alpha = x.y.atan2(x.x);
    Ok((alpha, beta))
}

/// Kronecker product `a ⊗ b`
///
/// Block `(i, j)` of the result is `a[(i, j)] * b`.
pub fn kron(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    a.kronecker(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rot_is_orthogonal() {
        let r = rot(0.3, 1.2, -2.1);
        let eye = r.transpose() * r;
        assert_relative_eq!(eye, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rot_inverse_convention() {
        let (a, b, c) = (0.7, 2.2, 4.1);
        let product = rot(a, b, c) * rot(-c, -b, -a);
        assert_relative_eq!(product, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_turn_about_y() {
        // +pi/2 about y sends z onto x
        let v = rot_y(FRAC_PI_2) * Vector3::z();
        assert_relative_eq!(v, Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_x_to_alpha_beta() {
        let (alpha, beta) = x_to_alpha_beta(&Vector3::new(0.0, 0.0, 2.0)).unwrap();
        assert_relative_eq!(beta, 0.0);
        assert_relative_eq!(alpha, 0.0);

        let (alpha, beta) = x_to_alpha_beta(&Vector3::new(0.0, -1.0, 0.0)).unwrap();
        assert_relative_eq!(beta, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(alpha, -FRAC_PI_2, epsilon = 1e-12);

        let (_, beta) = x_to_alpha_beta(&Vector3::new(0.0, 0.0, -3.0)).unwrap();
        assert_relative_eq!(beta, PI, epsilon = 1e-12);
    }

    #[test]
    fn test_x_to_alpha_beta_rejects_origin() {
        assert!(x_to_alpha_beta(&Vector3::zeros()).is_err());
    }

    #[test]
    fn test_alpha_beta_reconstructs_direction() {
        let x = Vector3::new(1.5, -0.4, 0.9);
        let (alpha, beta) = x_to_alpha_beta(&x).unwrap();
        let unit = rot(alpha, beta, 0.0) * Vector3::z();
        assert_relative_eq!(unit, x.normalize(), epsilon = 1e-12);
    }

    #[test]
    fn test_kron_layout() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(2, 1, &[1.0, -1.0]);
        let k = kron(&a, &b);
        assert_eq!(k.shape(), (4, 2));
        assert_relative_eq!(k[(0, 1)], 2.0);
        assert_relative_eq!(k[(1, 1)], -2.0);
        assert_relative_eq!(k[(3, 0)], -3.0);
    }

    #[test]
    fn test_rep_dim() {
        assert_eq!(rep_dim(0), 1);
        assert_eq!(rep_dim(3), 7);
    }
}

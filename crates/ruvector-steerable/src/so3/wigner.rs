//! Real irreducible representations of SO(3)
//!
//! `D_l(u)` is obtained by projecting the rotated harmonics back onto the
//! harmonic basis:
//!
//! ```text
//! D_l(u)[m, n] = ∫ Y_m(u x) Y_n(x) dx
//! ```
//!
//! The integrand is band limited to `2l`, so a Gauss-Legendre rule in
//! `cos beta` times a uniform rule in `alpha` evaluates it exactly up to
//! round-off.

use nalgebra::{DMatrix, Matrix3, Vector3};
use std::f64::consts::PI;

use super::{rot, spherical_harmonics};

const NEWTON_TOLERANCE: f64 = 1e-15;
const NEWTON_MAX_ITERS: usize = 100;

/// Gauss-Legendre nodes and weights on `[-1, 1]`
///
/// Exact for polynomials of degree `2n - 1`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    for i in 0..n {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();

        for _ in 0..NEWTON_MAX_ITERS {
            let (p_n, p_prev) = legendre_pair(n, x);
            let step = p_n / legendre_derivative(n, x, p_n, p_prev);
            x -= step;
            if step.abs() < NEWTON_TOLERANCE {
                break;
            }
        }

        let (p_n, p_prev) = legendre_pair(n, x);
        let derivative = legendre_derivative(n, x, p_n, p_prev);

        nodes.push(x);
        weights.push(2.0 / ((1.0 - x * x) * derivative * derivative));
    }

    (nodes, weights)
}

/// `(P_n(x), P_{n-1}(x))` for `n >= 1`
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let next = ((2 * k - 1) as f64 * x * p - (k - 1) as f64 * p_prev) / k as f64;
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}

/// `P_n'(x)` from `P_n` and `P_{n-1}`, valid for `|x| < 1`
#[inline]
fn legendre_derivative(n: usize, x: f64, p_n: f64, p_prev: f64) -> f64 {
    n as f64 * (x * p_n - p_prev) / (x * x - 1.0)
}

/// Direction angles of a unit vector, `(alpha, beta)`
fn unit_angles(v: &Vector3<f64>) -> (f64, f64) {
    (v.y.atan2(v.x), v.z.clamp(-1.0, 1.0).acos())
}

/// Representation matrix of `order` for the rotation matrix `rotation`
///
/// Satisfies `Y(rotation * x) = D * Y(x)`.
pub fn wigner_d(order: usize, rotation: &Matrix3<f64>) -> DMatrix<f64> {
    let dim = 2 * order + 1;
    if order == 0 {
        return DMatrix::identity(1, 1);
    }

    let (nodes, weights) = gauss_legendre(order + 2);
    let n_alpha = 2 * order + 2;
    let alpha_weight = 2.0 * PI / n_alpha as f64;

    let mut d = DMatrix::zeros(dim, dim);
    for (&z, &w) in nodes.iter().zip(weights.iter()) {
        let beta = z.acos();
        let sin_beta = beta.sin();
        for k in 0..n_alpha {
            let alpha = 2.0 * PI * k as f64 / n_alpha as f64;
            let x = Vector3::new(sin_beta * alpha.cos(), sin_beta * alpha.sin(), z);
            let (ra, rb) = unit_angles(&(rotation * x));

            let y = spherical_harmonics(order, alpha, beta);
            let y_rot = spherical_harmonics(order, ra, rb);
            d.ger(w * alpha_weight, &y_rot, &y, 1.0);
        }
    }
    d
}

/// Representation matrix of `order` for the ZYZ Euler angles `(alpha, beta, gamma)`
pub fn irr_repr(order: usize, alpha: f64, beta: f64, gamma: f64) -> DMatrix<f64> {
    wigner_d(order, &rot(alpha, beta, gamma))
}

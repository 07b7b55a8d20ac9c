//! Real spherical harmonics
//!
//! Orthonormal on the unit sphere. Component `m + l` of the returned vector
//! holds the harmonic of order `m`:
//!
//! ```text
//! m > 0:  sqrt(2) N_l^m P_l^m(cos beta) cos(m alpha)
//! m = 0:          N_l^0 P_l^0(cos beta)
//! m < 0:  sqrt(2) N_l^|m| P_l^|m|(cos beta) sin(|m| alpha)
//! ```

use nalgebra::{DVector, Vector3};
use std::f64::consts::{PI, SQRT_2};

use super::x_to_alpha_beta;
use crate::error::Result;

/// Normalized associated Legendre function `N_l^m P_l^m(x)` for `0 <= m <= l`
///
/// `N_l^m = sqrt((2l+1)/(4pi) * (l-m)!/(l+m)!)`, Condon-Shortley phase
/// included. Uses the sectoral start `P_m^m` and the three-term recurrence
/// in `l`.
pub fn associated_legendre_normalized(l: usize, m: usize, x: f64) -> f64 {
    debug_assert!(m <= l);

    let mut norm = ((2 * l + 1) as f64 / (4.0 * PI)).sqrt();
    if m > 0 {
        let mut factorial_ratio = 1.0;
        for k in (l - m + 1)..=(l + m) {
            factorial_ratio /= k as f64;
        }
        norm *= factorial_ratio.sqrt();
    }

    if l == 0 {
        return norm;
    }

    let sin_theta = x.mul_add(-x, 1.0).max(0.0).sqrt();

    // P_m^m = (-1)^m (2m-1)!! sin^m
    let mut pmm = 1.0;
    let mut odd = 1.0;
    for _ in 0..m {
        pmm *= -odd * sin_theta;
        odd += 2.0;
    }
    if l == m {
        return norm * pmm;
    }

    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return norm * pmmp1;
    }

    for n in (m + 2)..=l {
        let next = ((2 * n - 1) as f64 * x).mul_add(pmmp1, -((n + m - 1) as f64 * pmm))
            / (n - m) as f64;
        pmm = pmmp1;
        pmmp1 = next;
    }

    norm * pmmp1
}

/// Real spherical harmonics of `order` at azimuth `alpha`, polar angle `beta`
///
/// Returns a vector of length `2 * order + 1`.
pub fn spherical_harmonics(order: usize, alpha: f64, beta: f64) -> DVector<f64> {
    let l = order;
    let cos_beta = beta.cos();
    let mut out = DVector::zeros(2 * l + 1);

    out[l] = associated_legendre_normalized(l, 0, cos_beta);
    for m in 1..=l {
        let p = SQRT_2 * associated_legendre_normalized(l, m, cos_beta);
        let (s, c) = (m as f64 * alpha).sin_cos();
        out[l + m] = p * c;
        out[l - m] = p * s;
    }
    out
}

/// Real spherical harmonics of `order` in the direction of a non-zero vector
pub fn spherical_harmonics_xyz(order: usize, x: &Vector3<f64>) -> Result<DVector<f64>> {
    let (alpha, beta) = x_to_alpha_beta(x)?;
    Ok(spherical_harmonics(order, alpha, beta))
}

//! Analytic basis transformation `Q_J`
//!
//! For orders `(order_in, order_out)` the tensor-product representation
//! `R_tensor(u) = D_out(u) ⊗ D_in(u)` contains the irreducible
//! representation of order `J` exactly once when
//! `|order_in - order_out| <= J <= order_in + order_out`. The intertwiner
//! `Q_J` with
//!
//! ```text
//! R_tensor(u) Q_J = Q_J D_J(u)    for all u
//! ```
//!
//! is the null space of the Sylvester operator
//! `kron(R_tensor(u), I) - kron(I, D_J(u)^T)` acting on `vec(Q_J)`
//! (row-major), stacked over a handful of generic rotations.

use nalgebra::DMatrix;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::debug;

use crate::config::BasisConfig;
use crate::error::{Result, SteerableError};
use crate::null_space::get_matrices_kernel;
use crate::so3::{irr_repr, kron, rep_dim};
use crate::utils::{allclose_violation, dmatrix_to_array2};

/// Euler angles of the constraint rotations.
///
/// Generic enough that the stacked system has a one-dimensional null space
/// for every admissible triple encountered in practice; the dimension check
/// after the solve catches any triple where that fails.
pub const SAMPLE_ANGLES: [[f64; 3]; 5] = [
    [4.41301023, 5.56684102, 4.59384642],
    [4.93325116, 6.12697327, 4.14574096],
    [0.53878964, 4.09050444, 5.36539036],
    [2.16017393, 3.48835314, 5.55174441],
    [2.52385107, 0.2908958, 3.90040975],
];

fn r_tensor(order_in: usize, order_out: usize, a: f64, b: f64, c: f64) -> DMatrix<f64> {
    kron(&irr_repr(order_out, a, b, c), &irr_repr(order_in, a, b, c))
}

/// Sylvester coefficient matrix for one rotation
///
/// Shape `(M m, M m)` with `M = dim_out * dim_in`, `m = 2J + 1`.
pub fn sylvester_submatrix(
    j: usize,
    order_in: usize,
    order_out: usize,
    a: f64,
    b: f64,
    c: f64,
) -> DMatrix<f64> {
    let tensor = r_tensor(order_in, order_out, a, b, c);
    let irrep = irr_repr(j, a, b, c);
    let m = irrep.nrows();
    let big_m = tensor.nrows();
    kron(&tensor, &DMatrix::identity(m, m)) - kron(&DMatrix::identity(big_m, big_m), &irrep.transpose())
}

/// Change-of-basis matrix `Q_J`, shape `((2 order_out + 1)(2 order_in + 1), 2J + 1)`
///
/// Fails with [`SteerableError::NullSpaceDimension`] when the stacked
/// constraint does not have exactly one solution, which happens for `J`
/// outside the admissible range. The result is verified on
/// `config.check.random_rotations` seeded random rotations before it is
/// returned.
pub fn basis_transformation_q_j(
    j: usize,
    order_in: usize,
    order_out: usize,
    config: &BasisConfig,
) -> Result<Array2<f64>> {
    let constraints: Vec<DMatrix<f64>> = SAMPLE_ANGLES
        .iter()
        .map(|&[a, b, c]| sylvester_submatrix(j, order_in, order_out, a, b, c))
        .collect();

    let null_space = get_matrices_kernel(&constraints, config.null_space_eps)?;
    if null_space.nrows() != 1 {
        return Err(SteerableError::null_space_dimension(
            j,
            order_in,
            order_out,
            null_space.nrows(),
        ));
    }

    let rows = rep_dim(order_out) * rep_dim(order_in);
    let cols = rep_dim(j);
    // Row-major unvec: entry (r, c) sits at r * cols + c
    let q = DMatrix::from_row_iterator(rows, cols, null_space.row(0).iter().copied());

    verify_intertwiner(&q, j, order_in, order_out, config)?;

    debug!(j, order_in, order_out, rows, cols, "solved basis transformation");
    Ok(dmatrix_to_array2(&q))
}

fn verify_intertwiner(
    q: &DMatrix<f64>,
    j: usize,
    order_in: usize,
    order_out: usize,
    config: &BasisConfig,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(config.check.seed);
    for _ in 0..config.check.random_rotations {
        let a = rng.gen_range(0.0..2.0 * PI);
        let b = rng.gen_range(0.0..PI);
        let c = rng.gen_range(0.0..2.0 * PI);

        let lhs = r_tensor(order_in, order_out, a, b, c) * q;
        let rhs = q * irr_repr(j, a, b, c);
        let deviation =
            allclose_violation(lhs.iter().zip(rhs.iter()), config.check.rtol, config.check.atol);
        if deviation > 0.0 {
            return Err(SteerableError::equivariance_violation(
                format!("Q_J intertwiner (J={j}, in={order_in}, out={order_out})"),
                deviation,
            ));
        }
    }
    Ok(())
}

//! # RuVector Steerable
//!
//! Rotation-equivariant convolution kernel bases for volumetric (3D) data.
//!
//! Given input and output fields transforming under the irreducible
//! representations of orders `order_in` and `order_out`, every kernel `K`
//! built from the returned basis satisfies
//!
//! ```text
//! K(u x) = D_out(u) K(x) D_in(u)^-1    for all rotations u
//! ```
//!
//! ## Modules
//!
//! - **SO(3)**: rotations, real spherical harmonics, Wigner-D matrices
//! - **Null space**: SVD-based kernel of stacked constraint matrices
//! - **Transform**: Sylvester solve for the intertwiners `Q_J`
//! - **Sampling**: spherical harmonics on a voxel grid
//! - **Kernels**: raw cube assembly, the [`SteerableBasis`] engine
//! - **Window**: Gaussian radial shells with per-shell bandlimits
//! - **Equivariance**: quarter-turn and arbitrary-rotation checks
//! - **Cache**: persistent memoization of `Q_J` and harmonic cubes
//! - **Catalog**: bases for every order pair of a layer
//!
//! ## Architecture
//!
//! ```text
//!   null_space ──► transform (Q_J) ─┐
//!                                   ├──► kernels (K_J) ──► window ──► KernelBasis
//!   so3 ────────► sampling (Y_J) ───┘        │
//!                                            └── cache (trans_Q, sh_cube)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ruvector_steerable::prelude::*;
//!
//! let engine = SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::memory()))?;
//! let window = GaussianWindow::new(vec![5.0], vec![999], 2.0)?;
//!
//! let basis = engine
//!     .cube_basis_kernels(20, 2, 2, &window)?
//!     .expect("shell of radius 5 admits every order");
//!
//! let overlaps = check_basis_equivariance(basis.as_array(), 2, 2, 0.3, 1.2, 2.5)?;
//! assert!(overlaps.iter().all(|&o| o > 0.98));
//! # Ok::<(), SteerableError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod equivariance;
pub mod error;
pub mod kernels;
pub mod null_space;
pub mod sampling;
pub mod so3;
pub mod transform;
pub mod utils;
pub mod window;

// Re-exports for convenience
pub use cache::{BasisCache, CacheError, CacheKey, CacheStats, CachedArray};
pub use cache::{DiskCache, InMemoryCache, NoCache};
pub use catalog::BasisCatalog;
pub use config::{BasisConfig, CacheBackend, CacheConfig, SelfCheckConfig, CACHE_VERSION};
pub use equivariance::{check_basis_equivariance, check_quarter_turn, resample_rotated};
pub use error::{Result, SteerableError};
pub use kernels::{admissible_orders, cube_basis_kernels, KernelBasis, SampledCubes, SteerableBasis};
pub use null_space::{get_matrices_kernel, get_matrix_kernel};
pub use sampling::{radial_field, sample_sh_cube};
pub use so3::{irr_repr, rep_dim, rot, spherical_harmonics, x_to_alpha_beta};
pub use transform::basis_transformation_q_j;
pub use window::{gaussian_window_fct, gaussian_window_fct_convenience_wrapper};
pub use window::{GaussianShells, GaussianWindow, RadialWindow, WindowMode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{BasisCache, DiskCache, InMemoryCache, NoCache};
    pub use crate::catalog::BasisCatalog;
    pub use crate::config::*;
    pub use crate::equivariance::{check_basis_equivariance, check_quarter_turn};
    pub use crate::error::*;
    pub use crate::kernels::*;
    pub use crate::window::*;
}

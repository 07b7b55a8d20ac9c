//! # Kernel basis assembly
//!
//! For a kernel of side `size` mapping order `order_in` to order
//! `order_out`, every admissible intermediate order `J` contributes one raw
//! cube
//!
//! ```text
//! K_J[a, b, x, y, z] = sum_m Q_J[(a, b), m] Y_J[m, x, y, z]
//! ```
//!
//! A [`RadialWindow`] turns the raw cubes into the final basis, which is
//! normalized element by element.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ruvector_steerable::{BasisConfig, CacheConfig, GaussianShells, SteerableBasis, WindowMode};
//!
//! let engine = SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::memory()))?;
//! let basis = engine.cube_basis_kernels(5, 1, 1, &GaussianShells::new(WindowMode::Conservative))?;
//! if let Some(basis) = basis {
//!     assert_eq!(basis.as_array().shape(), &[basis.n_basis(), 3, 3, 5, 5, 5]);
//! }
//! # Ok::<(), ruvector_steerable::SteerableError>(())
//! ```

use ndarray::{Array, Array2, Array3, Array4, Array5, Array6, ArrayView5, Dimension};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{self, BasisCache, CacheKey, CacheStats, CachedArray};
use crate::config::BasisConfig;
use crate::equivariance::check_quarter_turn;
use crate::error::{Result, SteerableError};
use crate::sampling::{radial_field, sample_sh_cube};
use crate::so3::rep_dim;
use crate::transform::basis_transformation_q_j;
use crate::utils::norm;
use crate::window::RadialWindow;

const TRANS_Q_FUNCTION: &str = "trans_Q";
const SH_CUBE_FUNCTION: &str = "sh_cube";

/// Intermediate orders `|order_in - order_out| ..= order_in + order_out`
#[inline]
pub fn admissible_orders(order_in: usize, order_out: usize) -> RangeInclusive<usize> {
    order_in.abs_diff(order_out)..=order_in + order_out
}

/// Raw cubes of one `(size, order_in, order_out)` request
///
/// Windows receive this by shared reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledCubes {
    /// `K_J` per admissible order, each `(2 order_out + 1, 2 order_in + 1, size, size, size)`
    pub sh_cubes: Vec<Array5<f64>>,
    /// Distance of each voxel from the grid centre
    pub r_field: Array3<f64>,
    /// The orders `J`, ascending, parallel to `sh_cubes`
    pub order_irreps: Vec<usize>,
    /// Input representation order
    pub order_in: usize,
    /// Output representation order
    pub order_out: usize,
}

impl SampledCubes {
    /// Grid side length
    pub fn size(&self) -> usize {
        self.r_field.shape()[0]
    }
}

/// Normalized equivariant kernel basis
///
/// Shape `(n_basis, 2 order_out + 1, 2 order_in + 1, size, size, size)`,
/// `n_basis >= 1`, every element with unit Frobenius norm.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelBasis {
    data: Array6<f64>,
    order_in: usize,
    order_out: usize,
}

impl KernelBasis {
    /// Validate the shape of `raw` and normalize each element independently
    pub fn from_raw(mut raw: Array6<f64>, order_in: usize, order_out: usize) -> Result<Self> {
        let shape = raw.shape().to_vec();
        let size = shape[3];
        let expected = [shape[0], rep_dim(order_out), rep_dim(order_in), size, size, size];
        if let Some(axis) = (1..6).find(|&a| shape[a] != expected[a]) {
            return Err(SteerableError::dimension_mismatch(
                format!("windowed basis axis {axis}"),
                expected[axis],
                shape[axis],
            ));
        }
        if shape[0] == 0 {
            return Err(SteerableError::invalid_parameter(
                "basis",
                "a kernel basis has at least one element",
            ));
        }

        for (index, mut element) in raw.outer_iter_mut().enumerate() {
            let norm = norm(element.iter());
            if norm == 0.0 || !norm.is_finite() {
                return Err(SteerableError::ZeroEnergy { index });
            }
            element /= norm;
        }

        Ok(Self {
            data: raw,
            order_in,
            order_out,
        })
    }

    /// Number of basis elements
    pub fn n_basis(&self) -> usize {
        self.data.shape()[0]
    }

    /// Kernel side length
    pub fn size(&self) -> usize {
        self.data.shape()[3]
    }

    /// Input representation order
    pub fn order_in(&self) -> usize {
        self.order_in
    }

    /// Output representation order
    pub fn order_out(&self) -> usize {
        self.order_out
    }

    /// Element `index`
    pub fn element(&self, index: usize) -> ArrayView5<'_, f64> {
        self.data.index_axis(ndarray::Axis(0), index)
    }

    /// Frobenius norm of each element
    pub fn norms(&self) -> Vec<f64> {
        self.data
            .outer_iter()
            .map(|e| norm(e.iter()))
            .collect()
    }

    /// Borrow the tensor
    pub fn as_array(&self) -> &Array6<f64> {
        &self.data
    }

    /// Take the tensor
    pub fn into_array(self) -> Array6<f64> {
        self.data
    }

    /// Single-precision copy for consumers that train in `f32`
    pub fn to_f32(&self) -> Array6<f32> {
        self.data.mapv(|v| v as f32)
    }
}

/// Kernel-basis engine with an injected cache
///
/// Clones share the cache.
#[derive(Debug, Clone)]
pub struct SteerableBasis {
    config: BasisConfig,
    cache: Arc<dyn BasisCache>,
}

impl SteerableBasis {
    /// Create an engine whose cache backend is selected by `config.cache`
    pub fn new(config: BasisConfig) -> Result<Self> {
        config.validate()?;
        let cache = cache::from_config(&config.cache)?;
        Ok(Self { config, cache })
    }

    /// Create an engine from defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        Self::new(BasisConfig::from_env()?)
    }

    /// Create an engine with an explicit cache
    pub fn with_cache(config: BasisConfig, cache: Arc<dyn BasisCache>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, cache })
    }

    /// Engine configuration
    pub fn config(&self) -> &BasisConfig {
        &self.config
    }

    /// Cache backend
    pub fn cache(&self) -> &Arc<dyn BasisCache> {
        &self.cache
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Entries that do not rebuild into `expected_shape` are recomputed
    fn cached<D, F>(
        &self,
        key: CacheKey,
        expected_shape: &[usize],
        compute: F,
    ) -> Result<Array<f64, D>>
    where
        D: Dimension,
        F: FnOnce() -> Result<Array<f64, D>>,
    {
        if let Some(hit) = self.cache.get(&key)? {
            match hit.into_array::<D>() {
                Ok(array) if array.shape() == expected_shape => return Ok(array),
                Ok(array) => {
                    warn!(
                        %key,
                        found = ?array.shape(),
                        expected = ?expected_shape,
                        "cache entry has wrong shape, recomputing"
                    );
                }
                Err(e) => {
                    warn!(%key, error = %e, "cache entry does not rebuild, recomputing");
                }
            }
        }

        let value = compute()?;
        if let Err(e) = self.cache.put(&key, &CachedArray::from_array(&value)) {
            warn!(%key, error = %e, "failed to store cache entry");
        }
        Ok(value)
    }

    /// Cached [`basis_transformation_q_j`]
    pub fn basis_transformation_q_j(
        &self,
        j: usize,
        order_in: usize,
        order_out: usize,
    ) -> Result<Array2<f64>> {
        let key = CacheKey::new(
            TRANS_Q_FUNCTION,
            self.config.cache.version,
            &[j as i64, order_in as i64, order_out as i64],
        );
        let shape = [rep_dim(order_out) * rep_dim(order_in), rep_dim(j)];
        self.cached(key, &shape, || {
            basis_transformation_q_j(j, order_in, order_out, &self.config)
        })
    }

    /// Cached [`sample_sh_cube`]
    pub fn sample_sh_cube(&self, size: usize, j: usize) -> Result<Array4<f64>> {
        let key = CacheKey::new(
            SH_CUBE_FUNCTION,
            self.config.cache.version,
            &[size as i64, j as i64],
        );
        self.cached(key, &[rep_dim(j), size, size, size], || sample_sh_cube(size, j))
    }

    /// Raw cubes `K_J` for every admissible `J`, plus the radial field
    ///
    /// Every cube passes the quarter-turn check before it is returned.
    pub fn sample_cube(&self, size: usize, order_in: usize, order_out: usize) -> Result<SampledCubes> {
        let r_field = radial_field(size)?;
        let dim_out = rep_dim(order_out);
        let dim_in = rep_dim(order_in);
        let voxels = size * size * size;

        let order_irreps: Vec<usize> = admissible_orders(order_in, order_out).collect();
        let mut sh_cubes = Vec::with_capacity(order_irreps.len());

        for &j in &order_irreps {
            let y_j = self.sample_sh_cube(size, j)?;
            let q_j = self.basis_transformation_q_j(j, order_in, order_out)?;

            let y_flat = Array2::from_shape_vec((rep_dim(j), voxels), y_j.iter().copied().collect())?;
            let k_flat = q_j.dot(&y_flat);
            let k_j = Array5::from_shape_vec(
                (dim_out, dim_in, size, size, size),
                k_flat.iter().copied().collect(),
            )?;

            check_quarter_turn(
                &k_j,
                order_in,
                order_out,
                self.config.check.rtol,
                self.config.check.atol,
            )?;
            debug!(size, order_in, order_out, j, "sampled raw kernel cube");
            sh_cubes.push(k_j);
        }

        Ok(SampledCubes {
            sh_cubes,
            r_field,
            order_irreps,
            order_in,
            order_out,
        })
    }

    /// Normalized equivariant basis, or `None` when the window selects nothing
    pub fn cube_basis_kernels<W>(
        &self,
        size: usize,
        order_in: usize,
        order_out: usize,
        radial_window: &W,
    ) -> Result<Option<KernelBasis>>
    where
        W: RadialWindow + ?Sized,
    {
        let cubes = self.sample_cube(size, order_in, order_out)?;

        let basis = match radial_window.apply(&cubes)? {
            Some(raw) if raw.shape()[0] > 0 => Some(KernelBasis::from_raw(raw, order_in, order_out)?),
            _ => None,
        };

        info!(
            size,
            order_in,
            order_out,
            n_basis = basis.as_ref().map_or(0, KernelBasis::n_basis),
            "built kernel basis"
        );
        Ok(basis)
    }
}

/// [`SteerableBasis::cube_basis_kernels`] on an engine configured from the environment
pub fn cube_basis_kernels<W>(
    size: usize,
    order_in: usize,
    order_out: usize,
    radial_window: &W,
) -> Result<Option<KernelBasis>>
where
    W: RadialWindow + ?Sized,
{
    SteerableBasis::from_env()?.cube_basis_kernels(size, order_in, order_out, radial_window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::{CacheConfig, CACHE_VERSION};
    use crate::window::{GaussianShells, GaussianWindow, WindowMode};
    use approx::assert_relative_eq;

    fn engine() -> SteerableBasis {
        SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::disabled())).unwrap()
    }

    #[test]
    fn test_admissible_orders() {
        assert_eq!(admissible_orders(2, 2).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(admissible_orders(0, 3).collect::<Vec<_>>(), vec![3]);
        assert_eq!(admissible_orders(3, 1).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_sample_cube_contents() {
        let cubes = engine().sample_cube(5, 1, 2).unwrap();
        assert_eq!(cubes.order_irreps, vec![1, 2, 3]);
        assert_eq!(cubes.sh_cubes.len(), 3);
        assert_eq!(cubes.size(), 5);
        for cube in &cubes.sh_cubes {
            assert_eq!(cube.shape(), &[5, 3, 5, 5, 5]);
        }
        assert_eq!(cubes.r_field.shape(), &[5, 5, 5]);
    }

    #[test]
    fn test_cube_basis_kernels_normalized() {
        let window = GaussianWindow::new(vec![1.0, 2.0], vec![1, 2], 0.6).unwrap();
        let basis = engine().cube_basis_kernels(5, 1, 1, &window).unwrap().unwrap();
        // shell 1 takes J = 0, 1; shell 2 takes J = 0, 1, 2
        assert_eq!(basis.n_basis(), 5);
        assert_eq!(basis.as_array().shape(), &[5, 3, 3, 5, 5, 5]);
        for norm in basis.norms() {
            assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_window_gives_none() {
        // J_max = 0 admits nothing for (0, 2), whose only order is 2
        let window = GaussianWindow::new(vec![1.0], vec![0], 0.6).unwrap();
        assert!(engine().cube_basis_kernels(5, 0, 2, &window).unwrap().is_none());
    }

    #[test]
    fn test_closure_window_and_dyn_window() {
        let engine = engine();
        let shells: Box<dyn RadialWindow> = Box::new(GaussianShells::new(WindowMode::Sfcnn));
        let from_dyn = engine.cube_basis_kernels(4, 0, 0, shells.as_ref()).unwrap().unwrap();
        assert_eq!(from_dyn.n_basis(), 3);

        let nothing = |_: &SampledCubes| -> Result<Option<Array6<f64>>> { Ok(None) };
        assert!(engine.cube_basis_kernels(4, 0, 0, &nothing).unwrap().is_none());
    }

    #[test]
    fn test_window_shape_is_validated() {
        let wrong = |_: &SampledCubes| -> Result<Option<Array6<f64>>> {
            Ok(Some(Array6::ones((1, 2, 2, 3, 3, 3))))
        };
        let err = engine().cube_basis_kernels(3, 0, 0, &wrong).unwrap_err();
        assert!(matches!(err, SteerableError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_zero_energy_element_rejected() {
        let zeros = |_: &SampledCubes| -> Result<Option<Array6<f64>>> {
            Ok(Some(Array6::zeros((2, 1, 1, 3, 3, 3))))
        };
        assert!(matches!(
            engine().cube_basis_kernels(3, 0, 0, &zeros),
            Err(SteerableError::ZeroEnergy { index: 0 })
        ));
    }

    #[test]
    fn test_cache_hits_on_second_request() {
        let cache = Arc::new(InMemoryCache::new());
        let engine = SteerableBasis::with_cache(BasisConfig::new(), cache.clone()).unwrap();

        let first = engine.sample_cube(4, 1, 1).unwrap();
        let after_first = cache.stats();
        assert_eq!(after_first.hits, 0);
        // three Q_J and three Y_J
        assert_eq!(after_first.writes, 6);

        let second = engine.sample_cube(4, 1, 1).unwrap();
        assert_eq!(cache.stats().hits, 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_cache_entries_are_recomputed() {
        let cache = Arc::new(InMemoryCache::new());
        let engine = SteerableBasis::with_cache(BasisConfig::new(), cache.clone()).unwrap();
        let expected = engine.basis_transformation_q_j(1, 1, 0).unwrap();
        let sh_expected = engine.sample_sh_cube(3, 1).unwrap();

        // Wrong rank
        let q_key = CacheKey::new(TRANS_Q_FUNCTION, CACHE_VERSION, &[1, 1, 0]);
        cache
            .put(&q_key, &CachedArray { shape: vec![9], data: vec![0.0; 9] })
            .unwrap();
        assert_eq!(engine.basis_transformation_q_j(1, 1, 0).unwrap(), expected);

        // Right rank, wrong extents
        let sh_key = CacheKey::new(SH_CUBE_FUNCTION, CACHE_VERSION, &[3, 1]);
        cache
            .put(&sh_key, &CachedArray { shape: vec![1, 3, 3, 3], data: vec![0.0; 27] })
            .unwrap();
        assert_eq!(engine.sample_sh_cube(3, 1).unwrap(), sh_expected);

        // Recomputed values replace the malformed entries
        assert_eq!(cache.get(&q_key).unwrap().unwrap().shape, vec![3, 3]);
        assert_eq!(cache.get(&sh_key).unwrap().unwrap().shape, vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_cached_and_uncached_agree_bitwise() {
        let cached = SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::memory())).unwrap();
        let q_miss = cached.basis_transformation_q_j(2, 1, 1).unwrap();
        let q_hit = cached.basis_transformation_q_j(2, 1, 1).unwrap();
        let q_plain = engine().basis_transformation_q_j(2, 1, 1).unwrap();
        assert_eq!(q_miss, q_hit);
        assert_eq!(q_hit, q_plain);
    }

    #[test]
    fn test_to_f32() {
        let window = GaussianWindow::new(vec![0.0], vec![0], 1.0).unwrap();
        let basis = engine().cube_basis_kernels(3, 0, 0, &window).unwrap().unwrap();
        let single = basis.to_f32();
        assert_eq!(single.shape(), basis.as_array().shape());
        assert_eq!(basis.order_in(), 0);
        assert_eq!(basis.size(), 3);
        assert_relative_eq!(
            single[[0, 0, 0, 1, 1, 1]] as f64,
            basis.element(0)[[0, 0, 1, 1, 1]],
            epsilon = 1e-7
        );
    }
}

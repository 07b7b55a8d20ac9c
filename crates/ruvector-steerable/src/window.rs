//! Radial windowing
//!
//! The raw cubes `K_J` extend over the whole grid and alias at small radii
//! where the grid cannot resolve high angular frequencies. A radial window
//! localizes them on Gaussian shells and keeps, per shell, only the orders
//! `J` up to the shell's bandlimit.
//!
//! Any `Fn(&SampledCubes) -> Result<Option<Array6<f64>>>` is a window, so
//! custom policies need no new type.

use ndarray::{stack, Array3, Array5, Array6, ArrayView5, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

use crate::error::{Result, SteerableError};
use crate::kernels::SampledCubes;
use crate::utils::linspace;

/// Default shell width
pub const DEFAULT_SIGMA: f64 = 0.6;

/// Maps sampled cubes to an unnormalized basis
///
/// Returns `(N, 2 order_out + 1, 2 order_in + 1, size, size, size)` or
/// `None` when nothing is selected. Implementations only read `cubes`.
pub trait RadialWindow: Send + Sync {
    /// Apply the window
    fn apply(&self, cubes: &SampledCubes) -> Result<Option<Array6<f64>>>;
}

impl<F> RadialWindow for F
where
    F: Fn(&SampledCubes) -> Result<Option<Array6<f64>>> + Send + Sync,
{
    fn apply(&self, cubes: &SampledCubes) -> Result<Option<Array6<f64>>> {
        self(cubes)
    }
}

/// Gaussian shells with explicit radii and bandlimits
///
/// For each pair `(r, J_max)` the envelope
/// `exp(-((r_field - r) / sigma)^2 / 2) / (sqrt(2 pi) sigma)` multiplies
/// every cube whose order is at most `J_max`. `order_irreps` is scanned in
/// order and the scan stops at the first order above the bandlimit.
pub fn gaussian_window_fct(
    sh_cubes: &[Array5<f64>],
    r_field: &Array3<f64>,
    order_irreps: &[usize],
    radii: &[f64],
    j_max_list: &[usize],
    sigma: f64,
) -> Result<Option<Array6<f64>>> {
    if radii.len() != j_max_list.len() {
        return Err(SteerableError::dimension_mismatch(
            "radii vs J_max_list",
            radii.len(),
            j_max_list.len(),
        ));
    }
    if sh_cubes.len() != order_irreps.len() {
        return Err(SteerableError::dimension_mismatch(
            "sh_cubes vs order_irreps",
            order_irreps.len(),
            sh_cubes.len(),
        ));
    }
    check_sigma(sigma)?;

    let norm = 1.0 / ((2.0 * PI).sqrt() * sigma);
    let mut basis: Vec<Array5<f64>> = Vec::new();

    for (&radius, &j_max) in radii.iter().zip(j_max_list) {
        let envelope = r_field.mapv(|r| {
            let t = (r - radius) / sigma;
            (-0.5 * t * t).exp() * norm
        });

        for (cube, &j) in sh_cubes.iter().zip(order_irreps) {
            if j > j_max {
                break;
            }
            check_spatial_shape(cube, r_field)?;
            trace!(radius, j, j_max, "shell accepts order");

            let mut windowed = cube.clone();
            for mut row in windowed.outer_iter_mut() {
                for mut volume in row.outer_iter_mut() {
                    volume *= &envelope;
                }
            }
            basis.push(windowed);
        }
    }

    if basis.is_empty() {
        return Ok(None);
    }
    let views: Vec<ArrayView5<f64>> = basis.iter().map(|b| b.view()).collect();
    Ok(Some(stack(Axis(0), &views)?))
}

/// Radii and bandlimits derived from the kernel size
///
/// `size / 2 + 1` shells evenly spaced from `0` to `size / 2 - border_dist`,
/// with bandlimits read from the `mode` table.
pub fn gaussian_window_fct_convenience_wrapper(
    sh_cubes: &[Array5<f64>],
    r_field: &Array3<f64>,
    order_irreps: &[usize],
    mode: WindowMode,
    border_dist: f64,
    sigma: f64,
) -> Result<Option<Array6<f64>>> {
    let size = r_field.shape()[0];
    let radii = shell_radii(size, border_dist);
    let j_max_list = mode.shell_bandlimits(size)?;
    gaussian_window_fct(sh_cubes, r_field, order_irreps, &radii, &j_max_list, sigma)
}

/// Number of shells used for a kernel of `size`
#[inline]
pub fn n_radial(size: usize) -> usize {
    size / 2 + 1
}

/// Shell radii for a kernel of `size`
pub fn shell_radii(size: usize, border_dist: f64) -> Vec<f64> {
    linspace(0.0, (size / 2) as f64 - border_dist, n_radial(size))
}

fn check_sigma(sigma: f64) -> Result<()> {
    if sigma.is_nan() || sigma <= 0.0 {
        return Err(SteerableError::invalid_parameter("sigma", "must be > 0"));
    }
    Ok(())
}

fn check_spatial_shape(cube: &Array5<f64>, r_field: &Array3<f64>) -> Result<()> {
    if cube.shape()[2..] != *r_field.shape() {
        return Err(SteerableError::dimension_mismatch(
            "cube side vs r_field side",
            r_field.shape()[0],
            cube.shape()[2],
        ));
    }
    Ok(())
}

/// Per-shell bandlimit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Equivariance stays above 90% on every shell but the outermost
    Conservative,
    /// Between conservative and sfcnn
    #[default]
    Compromise,
    /// Bandlimits of the SFCNN architecture
    Sfcnn,
}

impl WindowMode {
    /// Bandlimit of each shell index
    pub const fn bandlimits(self) -> &'static [usize] {
        match self {
            Self::Conservative => &[0, 2, 4, 6, 8, 10, 12, 14],
            Self::Compromise => &[0, 3, 5, 7, 9, 11, 13, 15],
            Self::Sfcnn => &[0, 4, 6, 8, 10, 12, 14, 16],
        }
    }

    /// Bandlimits truncated to the shell count of `size`
    ///
    /// The tables cover eight shells; larger kernels are rejected.
    pub fn shell_bandlimits(self, size: usize) -> Result<Vec<usize>> {
        let table = self.bandlimits();
        let n = n_radial(size);
        if n > table.len() {
            return Err(SteerableError::dimension_mismatch(
                format!("radii vs J_max_list ({self} table)"),
                n,
                table.len(),
            ));
        }
        Ok(table[..n].to_vec())
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Conservative => "conservative",
            Self::Compromise => "compromise",
            Self::Sfcnn => "sfcnn",
        };
        f.write_str(name)
    }
}

impl FromStr for WindowMode {
    type Err = SteerableError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conservative" => Ok(Self::Conservative),
            "compromise" => Ok(Self::Compromise),
            "sfcnn" => Ok(Self::Sfcnn),
            other => Err(SteerableError::invalid_parameter(
                "mode",
                format!("unknown window mode '{other}' (expected conservative|compromise|sfcnn)"),
            )),
        }
    }
}

/// [`gaussian_window_fct`] with fixed radii and bandlimits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianWindow {
    radii: Vec<f64>,
    j_max_list: Vec<usize>,
    sigma: f64,
}

impl GaussianWindow {
    /// Create a window; `radii` and `j_max_list` must have equal length
    pub fn new(radii: Vec<f64>, j_max_list: Vec<usize>, sigma: f64) -> Result<Self> {
        if radii.len() != j_max_list.len() {
            return Err(SteerableError::dimension_mismatch(
                "radii vs J_max_list",
                radii.len(),
                j_max_list.len(),
            ));
        }
        check_sigma(sigma)?;
        Ok(Self {
            radii,
            j_max_list,
            sigma,
        })
    }

    /// Shell radii
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Shell bandlimits
    pub fn j_max_list(&self) -> &[usize] {
        &self.j_max_list
    }

    /// Shell width
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl RadialWindow for GaussianWindow {
    fn apply(&self, cubes: &SampledCubes) -> Result<Option<Array6<f64>>> {
        gaussian_window_fct(
            &cubes.sh_cubes,
            &cubes.r_field,
            &cubes.order_irreps,
            &self.radii,
            &self.j_max_list,
            self.sigma,
        )
    }
}

/// [`gaussian_window_fct_convenience_wrapper`] as a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianShells {
    /// Bandlimit table
    pub mode: WindowMode,
    /// Distance of the outermost shell from the outermost voxel centre
    pub border_dist: f64,
    /// Shell width
    pub sigma: f64,
}

impl Default for GaussianShells {
    fn default() -> Self {
        Self {
            mode: WindowMode::Compromise,
            border_dist: 0.0,
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl GaussianShells {
    /// Shells with the given mode and default border and width
    pub fn new(mode: WindowMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set the border distance
    #[must_use]
    pub fn with_border_dist(mut self, border_dist: f64) -> Self {
        self.border_dist = border_dist;
        self
    }

    /// Set the shell width
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }
}

impl RadialWindow for GaussianShells {
    fn apply(&self, cubes: &SampledCubes) -> Result<Option<Array6<f64>>> {
        gaussian_window_fct_convenience_wrapper(
            &cubes.sh_cubes,
            &cubes.r_field,
            &cubes.order_irreps,
            self.mode,
            self.border_dist,
            self.sigma,
        )
    }
}

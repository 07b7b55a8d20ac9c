//! Configuration for basis construction and caching

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SteerableError};
use crate::null_space::DEFAULT_EPS;

/// Version tag of the cached computations.
///
/// Bump whenever the numerical definition of a cached result changes;
/// entries written under another version are never read.
pub const CACHE_VERSION: u32 = 3;

/// Which cache backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Always recompute
    Disabled,
    /// Process-local map
    Memory,
    /// One gzip-compressed file per entry
    #[default]
    Disk,
}

impl std::str::FromStr for CacheBackend {
    type Err = SteerableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            other => Err(SteerableError::invalid_parameter(
                "cache backend",
                format!("unknown backend '{other}' (expected disabled|memory|disk)"),
            )),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend to use
    pub backend: CacheBackend,
    /// Root directory of the disk cache
    pub directory: PathBuf,
    /// Version tag folded into every key
    pub version: u32,
    /// gzip level (0-9)
    pub compression_level: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Disk,
            directory: default_cache_dir(),
            version: CACHE_VERSION,
            compression_level: 6,
        }
    }
}

impl CacheConfig {
    /// Disabled cache
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: CacheBackend::Disabled,
            ..Default::default()
        }
    }

    /// In-memory cache
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ..Default::default()
        }
    }

    /// Disk cache rooted at `directory`
    #[must_use]
    pub fn disk(directory: impl Into<PathBuf>) -> Self {
        Self {
            backend: CacheBackend::Disk,
            directory: directory.into(),
            ..Default::default()
        }
    }
}

/// `<user cache dir>/ruvector-steerable`, or `./cache` when the platform has none
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("ruvector-steerable"))
        .unwrap_or_else(|| PathBuf::from("cache"))
}

/// Tolerances of the internal equivariance self-checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckConfig {
    /// Relative tolerance of the allclose comparison
    pub rtol: f64,
    /// Absolute tolerance of the allclose comparison
    pub atol: f64,
    /// Random rotations used to verify each Q_J
    pub random_rotations: usize,
    /// Seed of the rotation sampler
    pub seed: u64,
}

impl Default for SelfCheckConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
            random_rotations: 4,
            seed: 0x5eed,
        }
    }
}

/// Configuration of a [`SteerableBasis`](crate::SteerableBasis) engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisConfig {
    /// Singular-value threshold of the null-space solver
    pub null_space_eps: f64,
    /// Self-check tolerances
    pub check: SelfCheckConfig,
    /// Cache settings
    pub cache: CacheConfig,
}

impl Default for BasisConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BasisConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            null_space_eps: DEFAULT_EPS,
            check: SelfCheckConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Default configuration with environment overrides applied
    ///
    /// Recognized variables:
    /// - `RUVECTOR_STEERABLE_CACHE`: `disabled|memory|disk`
    /// - `RUVECTOR_STEERABLE_CACHE_DIR`: disk cache root
    /// - `RUVECTOR_STEERABLE_CACHE_VERSION`: version tag
    /// - `RUVECTOR_STEERABLE_NULL_SPACE_EPS`: singular-value threshold
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("RUVECTOR_STEERABLE_CACHE") {
            self.cache.backend = backend.parse()?;
        }

        if let Ok(dir) = std::env::var("RUVECTOR_STEERABLE_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }

        if let Ok(version) = std::env::var("RUVECTOR_STEERABLE_CACHE_VERSION") {
            self.cache.version = version.parse().map_err(|_| {
                SteerableError::invalid_parameter(
                    "RUVECTOR_STEERABLE_CACHE_VERSION",
                    format!("'{version}' is not an unsigned integer"),
                )
            })?;
        }

        if let Ok(eps) = std::env::var("RUVECTOR_STEERABLE_NULL_SPACE_EPS") {
            self.null_space_eps = eps.parse().map_err(|_| {
                SteerableError::invalid_parameter(
                    "RUVECTOR_STEERABLE_NULL_SPACE_EPS",
                    format!("'{eps}' is not a number"),
                )
            })?;
        }

        Ok(())
    }

    /// Set the null-space threshold
    pub fn with_null_space_eps(mut self, eps: f64) -> Self {
        self.null_space_eps = eps;
        self
    }

    /// Set the cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the self-check tolerances
    pub fn with_check(mut self, check: SelfCheckConfig) -> Self {
        self.check = check;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.null_space_eps.is_nan() || self.null_space_eps <= 0.0 {
            return Err(SteerableError::invalid_parameter(
                "null_space_eps",
                "must be > 0",
            ));
        }
        if self.check.rtol < 0.0 || self.check.atol < 0.0 {
            return Err(SteerableError::invalid_parameter(
                "check",
                "tolerances must be >= 0",
            ));
        }
        if self.cache.compression_level > 9 {
            return Err(SteerableError::invalid_parameter(
                "compression_level",
                "must be in 0..=9",
            ));
        }
        Ok(())
    }
}

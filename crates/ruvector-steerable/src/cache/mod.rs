//! # Basis Cache
//!
//! Memoization of the expensive pure computations (basis transformation
//! matrices and spherical-harmonic cubes), keyed by function identity,
//! version tag and integer arguments.
//!
//! ## Backends
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `NoCache` | Benchmarks, debugging | Always recomputes |
//! | `InMemoryCache` | Tests, single process | Thread-safe map |
//! | `DiskCache` | Training runs | gzip + bincode, one file per key, atomic writes |
//!
//! Entries are append-only and never invalidated; bump
//! [`CACHE_VERSION`](crate::config::CACHE_VERSION) when a cached definition
//! changes. Racing writers of the same key produce identical bytes, so the
//! last rename wins harmlessly.

mod file;
mod memory;

pub use file::DiskCache;
pub use memory::InMemoryCache;

use ndarray::{Array, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{CacheBackend, CacheConfig};

/// Errors raised by cache backends
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key cannot be mapped to a cache location
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Identity of a cached computation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Name of the cached function
    pub function: String,
    /// Version tag
    pub version: u32,
    /// Ordered integer arguments
    pub args: Vec<i64>,
}

impl CacheKey {
    /// Create a key
    pub fn new(function: impl Into<String>, version: u32, args: &[i64]) -> Self {
        Self {
            function: function.into(),
            version,
            args: args.to_vec(),
        }
    }

    /// File stem of the entry, e.g. `4_1_2_v3`
    pub fn file_stem(&self) -> String {
        let mut stem: String = self
            .args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("_");
        if !stem.is_empty() {
            stem.push('_');
        }
        stem.push_str(&format!("v{}", self.version));
        stem
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}@v{}", self.function, self.args, self.version)
    }
}

/// Serialized tensor: row-major data plus shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedArray {
    /// Shape of the tensor
    pub shape: Vec<usize>,
    /// Data in row-major (logical) order
    pub data: Vec<f64>,
}

impl CachedArray {
    /// Capture an ndarray
    pub fn from_array<D: Dimension>(array: &Array<f64, D>) -> Self {
        Self {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    /// Rebuild an ndarray of dimensionality `D`
    pub fn into_array<D: Dimension>(self) -> crate::Result<Array<f64, D>> {
        let dynamic = Array::from_shape_vec(IxDyn(&self.shape), self.data)?;
        Ok(dynamic.into_dimensionality::<D>()?)
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required computation
    pub misses: u64,
    /// Entries written
    pub writes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Persistent key-value store for basis computations.
///
/// Implementations must be thread-safe. `get` returning `Ok(None)` is a
/// miss; the caller computes the value and calls `put`.
pub trait BasisCache: Send + Sync + fmt::Debug {
    /// Look up an entry
    fn get(&self, key: &CacheKey) -> Result<Option<CachedArray>, CacheError>;

    /// Store an entry
    fn put(&self, key: &CacheKey, value: &CachedArray) -> Result<(), CacheError>;

    /// Hit/miss/write counters
    fn stats(&self) -> CacheStats;
}

/// Cache that never stores anything
#[derive(Debug, Default)]
pub struct NoCache {
    stats: StatsCounter,
}

impl NoCache {
    /// Create a disabled cache
    pub fn new() -> Self {
        Self::default()
    }
}

impl BasisCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<CachedArray>, CacheError> {
        self.stats.miss();
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _value: &CachedArray) -> Result<(), CacheError> {
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

/// Build the backend selected by `config`
pub fn from_config(config: &CacheConfig) -> Result<Arc<dyn BasisCache>, CacheError> {
    Ok(match config.backend {
        CacheBackend::Disabled => Arc::new(NoCache::new()),
        CacheBackend::Memory => Arc::new(InMemoryCache::new()),
        CacheBackend::Disk => Arc::new(
            DiskCache::new(&config.directory)?.with_compression(config.compression_level),
        ),
    })
}

//! In-Memory Cache
//!
//! Thread-safe map for tests and single-process use.
//! Uses `parking_lot::RwLock` for concurrent access.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::{BasisCache, CacheError, CacheKey, CacheStats, CachedArray, StatsCounter};

/// Process-local basis cache
///
/// Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<CacheKey, CachedArray>>,
    stats: StatsCounter,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl BasisCache for InMemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedArray>, CacheError> {
        let found = self.entries.read().get(key).cloned();
        match found {
            Some(_) => {
                self.stats.hit();
                debug!(%key, "memory cache hit");
            }
            None => {
                self.stats.miss();
                debug!(%key, "memory cache miss");
            }
        }
        Ok(found)
    }

    fn put(&self, key: &CacheKey, value: &CachedArray) -> Result<(), CacheError> {
        self.entries.write().insert(key.clone(), value.clone());
        self.stats.write();
        debug!(%key, "memory cache write");
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

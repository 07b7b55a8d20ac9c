//! Disk Cache
//!
//! One gzip-compressed bincode file per entry:
//!
//! ```text
//! <root>/<function>/<arg0>_<arg1>_..._v<version>.bin.gz
//! ```
//!
//! Writes go to a temporary file in the target directory and are renamed
//! into place, so readers never observe a partial entry. A file that fails
//! to decode, or whose embedded key differs from the requested one, is
//! reported and treated as a miss.
//!
//! # Security
//!
//! Function names are used as directory names and are restricted to
//! alphanumeric characters, dashes and underscores.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{BasisCache, CacheError, CacheKey, CacheStats, CachedArray, StatsCounter};

const MAX_FUNCTION_NAME: usize = 128;

fn validate_function_name(name: &str) -> Result<(), CacheError> {
    if name.is_empty() || name.len() > MAX_FUNCTION_NAME {
        return Err(CacheError::InvalidKey(format!(
            "function name must be 1..={MAX_FUNCTION_NAME} characters"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(CacheError::InvalidKey(format!(
            "invalid character '{c}' in function name '{name}'"
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    key: &'a CacheKey,
    array: &'a CachedArray,
}

#[derive(Deserialize)]
struct Envelope {
    key: CacheKey,
    array: CachedArray,
}

/// Persistent on-disk basis cache
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    compression: Compression,
    stats: StatsCounter,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            compression: Compression::default(),
            stats: StatsCounter::default(),
        })
    }

    /// Set the gzip level (clamped to 0..=9)
    #[must_use]
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the entry for `key`
    pub fn entry_path(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        validate_function_name(&key.function)?;
        Ok(self
            .root
            .join(&key.function)
            .join(format!("{}.bin.gz", key.file_stem())))
    }

    fn decode(bytes: &[u8]) -> Result<Envelope, CacheError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        let (envelope, _) =
            bincode::serde::decode_from_slice::<Envelope, _>(&raw, bincode::config::standard())
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(envelope)
    }
}

impl BasisCache for DiskCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedArray>, CacheError> {
        let path = self.entry_path(key)?;

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.stats.miss();
                debug!(%key, "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        BufReader::new(file).read_to_end(&mut bytes)?;

        match Self::decode(&bytes) {
            Ok(envelope) if envelope.key == *key => {
                self.stats.hit();
                debug!(%key, path = %path.display(), "cache hit");
                Ok(Some(envelope.array))
            }
            Ok(envelope) => {
                warn!(
                    %key,
                    found = %envelope.key,
                    path = %path.display(),
                    "cache entry key mismatch, recomputing"
                );
                self.stats.miss();
                Ok(None)
            }
            Err(e) => {
                warn!(%key, path = %path.display(), error = %e, "corrupt cache entry, recomputing");
                self.stats.miss();
                Ok(None)
            }
        }
    }

    fn put(&self, key: &CacheKey, value: &CachedArray) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        let dir = self.root.join(&key.function);
        fs::create_dir_all(&dir)?;

        let bytes = bincode::serde::encode_to_vec(
            EnvelopeRef { key, array: value },
            bincode::config::standard(),
        )
        .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut encoder = GzEncoder::new(tmp.as_file_mut(), self.compression);
            encoder.write_all(&bytes)?;
            encoder.finish()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        self.stats.write();
        debug!(%key, path = %path.display(), bytes = bytes.len(), "cache write");
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

//! Content-addressed result cache
//!
//! A cache key is derived from two hashes:
//! - the dataset fingerprint (blake3 over each file's path and bytes, in order)
//! - the metric parameters (blake3 over their JSON encoding)
//!
//! Performance hints such as the worker count are never part of the parameter
//! struct, so they cannot change the key. Values are bincode-encoded score tables,
//! gzip-compressed on disk. There is no eviction.

use crate::error::{ComplexityError, Result};
use crate::metric::ScoreTable;
use complexity_common::ImageDataset;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Cache key for content-addressed storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Metric name, used as a subdirectory
    pub metric: String,

    /// Hash of the dataset contents
    pub dataset_hash: String,

    /// Hash of the semantic parameters
    pub params_hash: String,
}

impl CacheKey {
    /// Create a key from a dataset fingerprint and serializable parameters
    pub fn new<P: Serialize>(
        metric: impl Into<String>,
        dataset_hash: impl Into<String>,
        params: &P,
    ) -> Result<Self> {
        let encoded = serde_json::to_vec(params)?;
        Ok(Self {
            metric: metric.into(),
            dataset_hash: dataset_hash.into(),
            params_hash: blake3::hash(&encoded).to_hex().to_string(),
        })
    }

    /// File name for this entry inside the metric directory
    pub fn to_file_name(&self) -> String {
        format!("{}_{}.bin.gz", self.dataset_hash, self.params_hash)
    }

    /// Relative path of this entry below the cache root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.metric).join(self.to_file_name())
    }
}

/// Hash a dataset's paths and file contents
pub fn dataset_fingerprint(dataset: &ImageDataset) -> Result<String> {
    let mut hasher = blake3::Hasher::new();

    for path in dataset.paths() {
        let bytes = fs::read(path)?;
        let path_str = path.to_string_lossy();
        hasher.update(&(path_str.len() as u64).to_le_bytes());
        hasher.update(path_str.as_bytes());
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// On-disk memoization of score tables
///
/// A cache without a root directory never stores anything and always computes.
#[derive(Debug, Default)]
pub struct ResultCache {
    root: Option<PathBuf>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResultCache {
    /// Cache rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Cache that always recomputes
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Look up a cached table
    pub fn get(&self, key: &CacheKey) -> Result<Option<ScoreTable>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let path = root.join(key.relative_path());
        if !path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&path)?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut encoded = Vec::new();
        decoder.read_to_end(&mut encoded)?;

        let table = bincode::deserialize(&encoded).map_err(|e| {
            ComplexityError::Cache(format!("corrupt entry {}: {e}", path.display()))
        })?;
        Ok(Some(table))
    }

    /// Store a table under `key`
    pub fn put(&self, key: &CacheKey, table: &ScoreTable) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let path = root.join(key.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = bincode::serialize(table)
            .map_err(|e| ComplexityError::Cache(format!("failed to encode table: {e}")))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&encoded)?;
        let compressed = encoder.finish()?;

        // Write then rename so a crash never leaves a truncated entry behind
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, &compressed)?;
        fs::rename(&tmp, &path)?;

        debug!(
            "Cached {} ({} bytes compressed) at {}",
            key.metric,
            compressed.len(),
            path.display()
        );
        Ok(())
    }

    /// Return the cached table for `key` or compute, store and return it
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<ScoreTable>
    where
        F: FnOnce() -> Result<ScoreTable>,
    {
        if let Some(table) = self.get(key)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            info!("Using cached {} scores ({})", key.metric, key.to_file_name());
            return Ok(table);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let table = compute()?;
        self.put(key, &table)?;
        Ok(table)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

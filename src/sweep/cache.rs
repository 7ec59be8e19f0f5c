//! Content-addressed model cache.
//!
//! Fitted models are memoized under a hash of
//! `(cache version, dataset fingerprint, canonical hyperparameters)`, so a
//! repeated sweep over the same data reuses every handle without refitting.
//! Bumping the cache version invalidates all earlier entries.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sweep_forge::model::LogisticRegressionFitter;
//! use sweep_forge::sweep::{CachingFitter, ModelCache};
//!
//! let cache = Arc::new(ModelCache::new(1024));
//! let fitter = CachingFitter::new(LogisticRegressionFitter, Arc::clone(&cache), "1");
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::debug;

use super::args::TrainArgs;
use super::fitter::Fitter;
use super::hyperparams::HyperparameterConfig;
use crate::dataset::Dataset;
use crate::error::FitError;
use crate::metrics::MetricsCollector;
use crate::model::ModelHandle;

/// Default upper bound on cached models.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Hash of cached content for efficient lookup and comparison.
///
/// The hash is computed using SHA-256 and stored as a hex-encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes a string.
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self::from_digest(hasher.finalize().as_slice())
    }

    /// Wraps an already computed digest.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Get the hash string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache key for one fit.
pub fn cache_key(version: &str, dataset: &Dataset, hyperparameters: &HyperparameterConfig) -> ContentHash {
    ContentHash::from_content(&format!(
        "{}\n{}\n{}",
        version,
        dataset.fingerprint(),
        hyperparameters.canonical_json()
    ))
}

/// Cache entry with metadata for LRU eviction.
#[derive(Debug, Clone)]
struct CacheEntry {
    model: ModelHandle,
    last_accessed: Instant,
}

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total cache hits.
    pub hits: u64,
    /// Total cache misses.
    pub misses: u64,
    /// Total entries added.
    pub entries_added: u64,
    /// Total entries evicted.
    pub entries_evicted: u64,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0, or 0.0 if there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Bounded store of fitted models.
///
/// Thread-safe through interior `RwLock`s; evicts the least recently used
/// entry when full.
pub struct ModelCache {
    entries: RwLock<HashMap<ContentHash, CacheEntry>>,
    max_entries: usize,
    stats: RwLock<CacheStats>,
    metrics: MetricsCollector,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ModelCache {
    /// Creates a cache holding at most `max_entries` models (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            stats: RwLock::new(CacheStats::default()),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Looks up a model, refreshing its recency on a hit.
    pub fn get(&self, key: &ContentHash) -> Option<ModelHandle> {
        let found = {
            let mut entries = self.entries.write().expect("cache write lock poisoned");
            entries.get_mut(key).map(|entry| {
                entry.last_accessed = Instant::now();
                entry.model.clone()
            })
        };

        let mut stats = self.stats.write().expect("stats write lock poisoned");
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        self.metrics.record_cache_lookup(found.is_some());
        found
    }

    /// Stores a model, evicting the least recently used entry if full.
    pub fn insert(&self, key: ContentHash, model: ModelHandle) {
        let mut entries = self.entries.write().expect("cache write lock poisoned");

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            self.evict_oldest(&mut entries);
        }

        entries.insert(
            key,
            CacheEntry {
                model,
                last_accessed: Instant::now(),
            },
        );

        let mut stats = self.stats.write().expect("stats write lock poisoned");
        stats.entries_added += 1;
    }

    /// Evict the oldest (LRU) entry from the cache.
    fn evict_oldest(&self, entries: &mut HashMap<ContentHash, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(hash, _)| hash.clone());

        if let Some(hash) = oldest {
            entries.remove(&hash);
            let mut stats = self.stats.write().expect("stats write lock poisoned");
            stats.entries_evicted += 1;
            debug!(key = %hash, "Evicted cached model");
        }
    }

    pub fn contains(&self, key: &ContentHash) -> bool {
        self.entries
            .read()
            .expect("cache read lock poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache read lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry. Statistics are kept.
    pub fn clear(&self) {
        self.entries.write().expect("cache write lock poisoned").clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().expect("stats read lock poisoned").clone()
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Memoizing wrapper around another fitter.
///
/// Only successful fits are stored; failures always reach the inner fitter
/// again on the next call.
pub struct CachingFitter<F> {
    inner: F,
    cache: Arc<ModelCache>,
    version: String,
}

impl<F: Fitter> CachingFitter<F> {
    pub fn new(inner: F, cache: Arc<ModelCache>, version: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            version: version.into(),
        }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl<F: Fitter> Fitter for CachingFitter<F> {
    fn fit(&self, args: &TrainArgs) -> Result<ModelHandle, FitError> {
        let key = cache_key(&self.version, args.data(), args.hyperparameters());

        if let Some(model) = self.cache.get(&key) {
            debug!(index = args.index(), key = %key, "Model cache hit");
            return Ok(model);
        }

        let model = self.inner.fit(args)?;
        self.cache.insert(key, model.clone());
        Ok(model)
    }
}

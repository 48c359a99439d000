//! Relation path caching for condition evaluation.
//!
//! Provides an LRU cache of resolved relation paths keyed by
//! `(from, to)` element ids. Thread-safe using `Mutex` for LRU operations.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use atfx_model::Aid;
use lru::LruCache;

use crate::config::PathCacheConfig;
use crate::path::PathSearch;

/// LRU cache of relation path search outcomes.
///
/// Entries never expire: the evaluator borrows the schema immutably, so a
/// cached path cannot go stale while the cache is alive.
///
/// # Example
///
/// ```ignore
/// let cache = PathCache::new(PathCacheConfig::default());
/// cache.set((1, 3), find_relation_path(&model, 1, 3));
/// assert!(cache.get((1, 3)).is_some());
/// ```
pub struct PathCache {
    inner: Mutex<LruCache<(Aid, Aid), PathSearch>>,
}

impl PathCache {
    /// Creates a new path cache with the given configuration.
    pub fn new(config: PathCacheConfig) -> Self {
        Self::with_capacity(config.max_entries)
    }

    /// Creates a cache with custom capacity.
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Gets a cached search outcome, promoting it to most-recently-used.
    pub fn get(&self, key: (Aid, Aid)) -> Option<PathSearch> {
        let mut cache = self.inner.lock().ok()?;
        cache.get(&key).cloned()
    }

    /// Stores a search outcome; evicts the least recently used entry when full.
    pub fn set(&self, key: (Aid, Aid), search: PathSearch) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(key, search);
        }
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(cache) => cache.len(),
            _ => 0,
        }
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the cache.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.clear();
        }
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_set_get() {
        let cache = PathCache::with_capacity(4);
        assert!(cache.is_empty());
        cache.set((1, 2), PathSearch::NotFound);
        assert_eq!(cache.get((1, 2)), Some(PathSearch::NotFound));
        assert!(cache.get((2, 1)).is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = PathCache::with_capacity(2);
        cache.set((1, 2), PathSearch::NotFound);
        cache.set((1, 3), PathSearch::NotFound);
        let _ = cache.get((1, 2));
        cache.set((1, 4), PathSearch::NotFound);

        assert_eq!(cache.len(), 2);
        assert!(cache.get((1, 2)).is_some());
        assert!(cache.get((1, 3)).is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = PathCache::new(PathCacheConfig { max_entries: 0 });
        cache.set((1, 2), PathSearch::NotFound);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}

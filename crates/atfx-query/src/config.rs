//! Configuration types for the condition evaluator.

/// Configuration for the condition evaluator.
///
/// # Example
///
/// ```rust
/// use atfx_query::{PathCacheConfig, QueryConfig};
///
/// let config = QueryConfig::builder()
///     .with_path_cache(PathCacheConfig::default())
///     .with_max_results(100_000)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Relation path cache configuration (None = paths resolved on every call).
    pub path_cache: Option<PathCacheConfig>,
    /// Maximum number of filter results (None = unlimited).
    pub max_results: Option<usize>,
}

impl QueryConfig {
    /// Creates a new builder for QueryConfig.
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }
}

/// Builder for QueryConfig.
#[derive(Debug, Clone, Default)]
pub struct QueryConfigBuilder {
    path_cache: Option<PathCacheConfig>,
    max_results: Option<usize>,
}

impl QueryConfigBuilder {
    /// Enables the relation path cache.
    pub fn with_path_cache(mut self, path_cache: PathCacheConfig) -> Self {
        self.path_cache = Some(path_cache);
        self
    }

    /// Sets the maximum number of results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Builds the QueryConfig.
    pub fn build(self) -> QueryConfig {
        QueryConfig {
            path_cache: self.path_cache,
            max_results: self.max_results,
        }
    }
}

/// Configuration for the relation path cache.
#[derive(Debug, Clone)]
pub struct PathCacheConfig {
    /// Maximum number of cached (from, to) element pairs.
    pub max_entries: usize,
}

impl Default for PathCacheConfig {
    fn default() -> Self {
        Self { max_entries: 256 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_config_default() {
        let config = QueryConfig::default();
        assert!(config.path_cache.is_none());
        assert!(config.max_results.is_none());
    }

    #[test]
    fn test_query_config_builder() {
        let config = QueryConfig::builder()
            .with_path_cache(PathCacheConfig { max_entries: 16 })
            .with_max_results(10)
            .build();

        assert_eq!(config.path_cache.map(|c| c.max_entries), Some(16));
        assert_eq!(config.max_results, Some(10));
    }

    #[test]
    fn test_path_cache_config_default() {
        assert_eq!(PathCacheConfig::default().max_entries, 256);
    }
}

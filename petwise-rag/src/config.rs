//! Configuration for retrieval and matching.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::vectorstore::{ARTICLE_COLLECTION, PRODUCT_COLLECTION};

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Upper bound on `k` for the restricted product query.
    pub max_candidates: usize,
    /// Number of ranked products that receive match evidence.
    pub match_top_m: usize,
    /// Memoized product searches kept in the LRU.
    pub retriever_cache_size: usize,
    /// Query embeddings kept in the LRU.
    pub embedding_cache_size: usize,
    /// Lock shards for both caches.
    pub cache_shards: usize,
    /// Product searches allowed to run at once.
    pub search_concurrency: usize,
    /// Searches allowed to wait for a slot before callers get "busy".
    pub search_queue_limit: usize,
    /// Articles returned per article search.
    pub article_top_k: usize,
    /// Base delay before the single vector-store retry.
    pub retry_delay_ms: u64,
    pub product_collection: String,
    pub article_collection: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_candidates: 300,
            match_top_m: 30,
            retriever_cache_size: 512,
            embedding_cache_size: 2048,
            cache_shards: 8,
            search_concurrency: std::thread::available_parallelism().map_or(4, |n| n.get()),
            search_queue_limit: 64,
            article_top_k: 3,
            retry_delay_ms: 100,
            product_collection: PRODUCT_COLLECTION.to_string(),
            article_collection: ARTICLE_COLLECTION.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    pub fn max_candidates(mut self, n: usize) -> Self {
        self.config.max_candidates = n;
        self
    }

    pub fn match_top_m(mut self, n: usize) -> Self {
        self.config.match_top_m = n;
        self
    }

    pub fn retriever_cache_size(mut self, n: usize) -> Self {
        self.config.retriever_cache_size = n;
        self
    }

    pub fn embedding_cache_size(mut self, n: usize) -> Self {
        self.config.embedding_cache_size = n;
        self
    }

    pub fn cache_shards(mut self, n: usize) -> Self {
        self.config.cache_shards = n;
        self
    }

    pub fn search_concurrency(mut self, n: usize) -> Self {
        self.config.search_concurrency = n;
        self
    }

    pub fn search_queue_limit(mut self, n: usize) -> Self {
        self.config.search_queue_limit = n;
        self
    }

    pub fn article_top_k(mut self, n: usize) -> Self {
        self.config.article_top_k = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn product_collection(mut self, name: impl Into<String>) -> Self {
        self.config.product_collection = name.into();
        self
    }

    pub fn article_collection(mut self, name: impl Into<String>) -> Self {
        self.config.article_collection = name.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a count that sizes a cache, a
    /// query, or the semaphore is zero, or a collection name is blank.
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        for (name, value) in [
            ("max_candidates", c.max_candidates),
            ("retriever_cache_size", c.retriever_cache_size),
            ("embedding_cache_size", c.embedding_cache_size),
            ("cache_shards", c.cache_shards),
            ("search_concurrency", c.search_concurrency),
        ] {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        if c.product_collection.trim().is_empty() || c.article_collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection names must not be empty".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.max_candidates, 300);
        assert_eq!(config.match_top_m, 30);
        assert!(config.search_concurrency > 0);
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(RagConfig::builder().search_concurrency(0).build().is_err());
        assert!(RagConfig::builder().cache_shards(0).build().is_err());
        assert!(RagConfig::builder().product_collection(" ").build().is_err());
        assert!(RagConfig::builder().search_queue_limit(0).build().is_ok());
    }
}

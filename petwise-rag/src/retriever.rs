//! Memoized hybrid retrieval: catalog pre-filter, restricted vector query,
//! then an ingredient-tag post-filter.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::cache::ShardedLru;
use crate::catalog::Catalog;
use crate::config::RagConfig;
use crate::document::{INGREDIENT_TAG_PREFIX, Metadata, RetrievalResult, tag_values};
use crate::error::{RagError, Result};
use crate::gateway::VectorGateway;

/// Arguments of one product search. Also the memoization key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductQuery {
    pub query: String,
    #[serde(default)]
    pub required_ingredients: Vec<String>,
    #[serde(default)]
    pub excluded_ingredients: Vec<String>,
    #[serde(default)]
    pub category_level_1: Vec<String>,
    #[serde(default)]
    pub category_level_2: Vec<String>,
}

impl ProductQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }
}

/// The excluded term (lowercased) that one of the candidate's ingredient tags contains, if any.
pub fn excluded_tag_hit(metadata: &Metadata, excluded_lower: &[String]) -> Option<String> {
    tag_values(metadata, INGREDIENT_TAG_PREFIX).find_map(|tag| {
        let tag = tag.to_lowercase();
        excluded_lower.iter().find(|e| tag.contains(e.as_str())).cloned()
    })
}

/// Decrements the waiting counter however the wait ends.
struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Product retriever with an LRU memo and bounded concurrency.
///
/// At most `search_concurrency` searches run at once. Further callers wait,
/// up to `search_queue_limit` of them; beyond that a call fails immediately
/// with [`RagError::Busy`].
pub struct ProductRetriever {
    catalog: Arc<Catalog>,
    gateway: Arc<VectorGateway>,
    collection: String,
    max_candidates: usize,
    cache: ShardedLru<ProductQuery, Arc<RetrievalResult>>,
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    queue_limit: usize,
}

impl ProductRetriever {
    pub fn new(catalog: Arc<Catalog>, gateway: Arc<VectorGateway>, config: &RagConfig) -> Self {
        Self {
            catalog,
            gateway,
            collection: config.product_collection.clone(),
            max_candidates: config.max_candidates,
            cache: ShardedLru::new(config.retriever_cache_size, config.cache_shards),
            permits: Arc::new(Semaphore::new(config.search_concurrency)),
            waiting: AtomicUsize::new(0),
            queue_limit: config.search_queue_limit,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(permit);
        }
        let waiting = self.waiting.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = Waiting(&self.waiting);
        if waiting > self.queue_limit {
            warn!(waiting, limit = self.queue_limit, "search queue full");
            return Err(RagError::Busy { waiting: waiting - 1 });
        }
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| RagError::PipelineError(format!("search semaphore closed: {e}")))
    }

    /// Run (or replay) a search. Returns parallel lists ordered by distance.
    pub async fn retrieve(&self, query: &ProductQuery) -> Result<Arc<RetrievalResult>> {
        if let Some(hit) = self.cache.get(query) {
            debug!(query = %query.query, "retriever cache hit");
            return Ok(hit);
        }

        let _permit = self.acquire().await?;
        if let Some(hit) = self.cache.get(query) {
            return Ok(hit);
        }

        let started = Instant::now();
        let catalog = Arc::clone(&self.catalog);
        let args = query.clone();
        let ids = tokio::task::spawn_blocking(move || {
            catalog.filter(
                &args.required_ingredients,
                &args.excluded_ingredients,
                &args.category_level_1,
                &args.category_level_2,
            )
        })
        .await
        .map_err(|e| RagError::PipelineError(format!("catalog filter task failed: {e}")))?;

        let result = if ids.is_empty() {
            info!(query = %query.query, "catalog filter matched nothing");
            RetrievalResult::empty()
        } else {
            let k = self.max_candidates.min(ids.len());
            let mut result = self.gateway.query(&self.collection, &query.query, Some(&ids), k).await?;

            let allowed: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let excluded: Vec<String> = query
                .excluded_ingredients
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            let before = result.len();
            result.retain(|id, metadata| {
                allowed.contains(id) && excluded_tag_hit(metadata, &excluded).is_none()
            });
            if result.len() < before {
                debug!(dropped = before - result.len(), "ingredient tag post-filter");
            }
            result
        };

        info!(
            query = %query.query,
            filtered = ids.len(),
            returned = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "product retrieval"
        );

        let result = Arc::new(result);
        self.cache.insert(query.clone(), Arc::clone(&result));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MetadataValue;

    #[test]
    fn tag_hit_is_case_insensitive_substring() {
        let mut metadata = Metadata::new();
        metadata.insert("ingredienttag:Chicken Meal".into(), MetadataValue::Bool(true));
        metadata.insert("name".into(), "chicken-free kibble".into());

        assert_eq!(excluded_tag_hit(&metadata, &["chicken".into()]), Some("chicken".into()));
        assert_eq!(excluded_tag_hit(&metadata, &["beef".into()]), None);
    }
}

//! Query-text front door to the vector store.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Embeds query text and runs restricted similarity queries.
///
/// A failed store call is retried once after a jittered delay; a second
/// failure is returned to the caller.
pub struct VectorGateway {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry_delay: Duration,
}

impl VectorGateway {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder, retry_delay: Duration::from_millis(100) }
    }

    /// Base delay before the single retry. The actual wait is 50–150 % of it.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed `text` and return up to `k` nearest records, optionally restricted to `restrict_to_ids`.
    pub async fn query(
        &self,
        collection: &str,
        text: &str,
        restrict_to_ids: Option<&[String]>,
        k: usize,
    ) -> Result<RetrievalResult> {
        if k == 0 || restrict_to_ids.is_some_and(<[String]>::is_empty) {
            return Ok(RetrievalResult::empty());
        }

        let embedding = self.embedder.embed(text).await?;
        debug!(collection, k, restricted = restrict_to_ids.map(<[String]>::len), "vector query");

        match self.store.query(collection, &embedding, restrict_to_ids, k).await {
            Ok(result) => Ok(result),
            Err(first) => {
                warn!(collection, error = %first, "vector query failed, retrying once");
                tokio::time::sleep(jittered(self.retry_delay)).await;
                self.store.query(collection, &embedding, restrict_to_ids, k).await.map_err(|e| {
                    RagError::PipelineError(format!("vector query on '{collection}' failed twice: {e}"))
                })
            }
        }
    }

    /// Fetch every record whose id starts with `prefix`, with the same retry policy.
    pub async fn get_by_id_prefix(&self, collection: &str, prefix: &str) -> Result<RetrievalResult> {
        match self.store.get_by_id_prefix(collection, prefix).await {
            Ok(result) => Ok(result),
            Err(first) => {
                warn!(collection, prefix, error = %first, "prefix lookup failed, retrying once");
                tokio::time::sleep(jittered(self.retry_delay)).await;
                self.store.get_by_id_prefix(collection, prefix).await
            }
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::thread_rng().gen_range(0..=base_ms);
    Duration::from_millis(base_ms / 2 + jitter)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::document::IndexRecord;
    use crate::embedding::HashingEmbeddingProvider;

    /// Fails the first `failures` queries, then answers with one record.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for Flaky {
        async fn create_collection(&self, _: &str, _: usize) -> Result<()> {
            Ok(())
        }

        async fn upsert(&self, _: &str, _: &[IndexRecord]) -> Result<()> {
            Ok(())
        }

        async fn count(&self, _: &str) -> Result<usize> {
            Ok(1)
        }

        async fn query(
            &self,
            _: &str,
            _: &[f32],
            _: Option<&[String]>,
            _: usize,
        ) -> Result<RetrievalResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(RagError::VectorStoreError {
                    backend: "flaky".into(),
                    message: "unavailable".into(),
                });
            }
            let mut result = RetrievalResult::empty();
            result.push("1".into(), Default::default(), String::new(), 0.1);
            Ok(result)
        }

        async fn get_by_id_prefix(&self, _: &str, _: &str) -> Result<RetrievalResult> {
            Ok(RetrievalResult::empty())
        }
    }

    fn gateway(failures: usize) -> (VectorGateway, Arc<Flaky>) {
        let store = Arc::new(Flaky { failures, calls: AtomicUsize::new(0) });
        let gateway =
            VectorGateway::new(store.clone(), Arc::new(HashingEmbeddingProvider::new(16)))
                .with_retry_delay(Duration::from_millis(1));
        (gateway, store)
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let (gateway, store) = gateway(1);
        let result = gateway.query("c", "dog food", None, 5).await.unwrap();
        assert_eq!(result.ids, ["1"]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let (gateway, store) = gateway(2);
        assert!(gateway.query("c", "dog food", None, 5).await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_restriction_skips_io() {
        let (gateway, store) = gateway(0);
        let result = gateway.query("c", "dog food", Some(&[]), 5).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}

//! Vector store trait for restricted similarity search.

use async_trait::async_trait;

use crate::document::{IndexRecord, RetrievalResult};
use crate::error::Result;

/// Collection holding one or more review-synthesis records per product.
pub const PRODUCT_COLLECTION: &str = "review_synthesis";
/// Collection holding pet-care articles.
pub const ARTICLE_COLLECTION: &str = "articles";

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`IndexRecord`]s. Queries
/// return parallel lists ordered by ascending cosine distance.
///
/// # Example
///
/// ```rust,ignore
/// use petwise_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("review_synthesis", 256).await?;
/// store.upsert("review_synthesis", &records).await?;
/// let ids = vec!["1001".to_string(), "1002".to_string()];
/// let hits = store.query("review_synthesis", &embedding, Some(&ids), 10).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Insert or replace records by id. Records must have embeddings set.
    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Return up to `k` records closest to `embedding`.
    ///
    /// When `restrict_to_ids` is given only records whose id is listed are
    /// candidates, so at most `min(k, restrict_to_ids.len())` are returned.
    /// No candidates is an empty result, not an error.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        restrict_to_ids: Option<&[String]>,
        k: usize,
    ) -> Result<RetrievalResult>;

    /// All records whose id starts with `prefix`, in id order, with distance 0.
    async fn get_by_id_prefix(&self, collection: &str, prefix: &str) -> Result<RetrievalResult>;
}

//! Pet-care article lookup.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::metadata_str;
use crate::error::Result;
use crate::gateway::VectorGateway;
use crate::vectorstore::ARTICLE_COLLECTION;

/// An article suggested to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleHit {
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// Finds the closest articles for a free-text question.
pub struct ArticleRetriever {
    gateway: Arc<VectorGateway>,
    collection: String,
    top_k: usize,
    summary_chars: usize,
}

impl ArticleRetriever {
    pub fn new(gateway: Arc<VectorGateway>) -> Self {
        Self { gateway, collection: ARTICLE_COLLECTION.to_string(), top_k: 3, summary_chars: 300 }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_summary_chars(mut self, summary_chars: usize) -> Self {
        self.summary_chars = summary_chars;
        self
    }

    /// Up to `top_k` articles, closest first, one per URL.
    pub async fn search(&self, query: &str) -> Result<Vec<ArticleHit>> {
        if self.top_k == 0 {
            return Ok(Vec::new());
        }
        // Several chunks of one article may be indexed; over-fetch before deduplicating.
        let result = self.gateway.query(&self.collection, query, None, self.top_k * 4).await?;

        let mut seen = HashSet::new();
        let mut hits = Vec::with_capacity(self.top_k);
        for (i, id) in result.ids.iter().enumerate() {
            let metadata = &result.metadatas[i];
            let url = metadata_str(metadata, "url")
                .or_else(|| metadata_str(metadata, "source_url"))
                .unwrap_or_default()
                .to_string();
            let key = if url.is_empty() { id.clone() } else { url.clone() };
            if !seen.insert(key) {
                continue;
            }

            let title = metadata_str(metadata, "title").unwrap_or(id).to_string();
            let summary = metadata_str(metadata, "summary")
                .map(str::to_string)
                .unwrap_or_else(|| result.documents[i].clone());
            hits.push(ArticleHit { title, url, summary: truncate(&summary, self.summary_chars) });
            if hits.len() == self.top_k {
                break;
            }
        }

        debug!(query_len = query.len(), hits = hits.len(), "article search");
        Ok(hits)
    }
}

/// Cut `text` to at most `max_chars` characters, ending on a word boundary with an ellipsis.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > max_chars / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{IndexRecord, Metadata, MetadataValue};
    use crate::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
    use crate::inmemory::InMemoryVectorStore;
    use crate::vectorstore::VectorStore;

    fn article(id: &str, title: &str, url: &str, body: &str, embedder: &HashingEmbeddingProvider) -> IndexRecord {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), MetadataValue::from(title));
        metadata.insert("url".into(), MetadataValue::from(url));
        IndexRecord {
            id: id.into(),
            document: body.into(),
            embedding: embedder.embed_text(body),
            metadata,
        }
    }

    #[test]
    fn truncate_prefers_word_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("new puppy checklist for owners", 20), "new puppy checklist…");
    }

    #[tokio::test]
    async fn deduplicates_by_url() {
        let embedder = HashingEmbeddingProvider::new(64);
        let store = InMemoryVectorStore::new();
        store.create_collection(ARTICLE_COLLECTION, embedder.dimensions()).await.unwrap();
        store
            .upsert(
                ARTICLE_COLLECTION,
                &[
                    article("a1", "New Puppy Guide", "https://ex.com/puppy", "new puppy tips", &embedder),
                    article("a2", "New Puppy Guide", "https://ex.com/puppy", "puppy tips crate", &embedder),
                    article("b1", "Crate Training", "https://ex.com/crate", "crate training tips", &embedder),
                ],
            )
            .await
            .unwrap();

        let gateway = Arc::new(VectorGateway::new(Arc::new(store), Arc::new(embedder)));
        let hits = ArticleRetriever::new(gateway).search("new puppy tips").await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "New Puppy Guide");
        assert_eq!(hits[1].url, "https://ex.com/crate");
    }
}

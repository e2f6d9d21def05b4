//! In-memory vector store using cosine distance.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` of copy-on-write collections protected by a `tokio::sync::RwLock`.
//! Scoring runs on the blocking thread pool so a large restricted query never
//! stalls the async workers. Collections can be loaded from and persisted to a
//! directory of `<collection>.jsonl` files, one [`IndexRecord`] per line.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{IndexRecord, RetrievalResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

fn store_error(message: impl Into<String>) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: message.into() }
}

#[derive(Debug, Clone, Default)]
struct Collection {
    records: Vec<IndexRecord>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, record: IndexRecord) {
        match self.positions.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn nearest(&self, embedding: &[f32], restrict: Option<&[String]>, k: usize) -> RetrievalResult {
        let candidates: Vec<usize> = match restrict {
            Some(ids) => {
                let mut seen = HashSet::with_capacity(ids.len());
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter_map(|id| self.positions.get(id).copied())
                    .collect()
            }
            None => (0..self.records.len()).collect(),
        };

        let mut scored: Vec<(f32, usize)> = candidates
            .into_iter()
            .map(|pos| (cosine_distance(&self.records[pos].embedding, embedding), pos))
            .collect();
        scored.sort_by(|a, b| {
            a.0.total_cmp(&b.0).then_with(|| self.records[a.1].id.cmp(&self.records[b.1].id))
        });
        scored.truncate(k);

        let mut result = RetrievalResult::empty();
        for (distance, pos) in scored {
            let record = &self.records[pos];
            result.push(record.id.clone(), record.metadata.clone(), record.document.clone(), distance);
        }
        result
    }
}

/// An in-memory vector store using cosine distance for search.
///
/// # Example
///
/// ```rust,ignore
/// use petwise_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::load_dir("data/vector_store")?;
/// let n = store.count("review_synthesis").await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<collection>.jsonl` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the directory cannot be read or
    /// a line is not a valid record; the error names the file and line.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| store_error(format!("cannot read {}: {e}", dir.display())))?;

        let mut collections = HashMap::new();
        for entry in entries {
            let path = entry.map_err(|e| store_error(e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let file = fs::File::open(&path)
                .map_err(|e| store_error(format!("cannot open {}: {e}", path.display())))?;
            let mut collection = Collection::default();
            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| store_error(format!("{}: {e}", path.display())))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: IndexRecord = serde_json::from_str(&line).map_err(|e| {
                    store_error(format!("{} line {}: {e}", path.display(), line_no + 1))
                })?;
                collection.upsert(record);
            }
            info!(collection = %name, records = collection.records.len(), "loaded collection");
            collections.insert(name, Arc::new(collection));
        }

        Ok(Self { collections: RwLock::new(collections) })
    }

    /// Write every collection to `<dir>/<collection>.jsonl`, replacing files atomically.
    pub async fn persist_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref().to_path_buf();
        let snapshot: Vec<(String, Arc<Collection>)> = {
            let collections = self.collections.read().await;
            collections.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };

        tokio::task::spawn_blocking(move || -> Result<()> {
            fs::create_dir_all(&dir).map_err(|e| store_error(e.to_string()))?;
            for (name, collection) in snapshot {
                let final_path = dir.join(format!("{name}.jsonl"));
                let tmp_path = dir.join(format!("{name}.jsonl.tmp"));
                let file = fs::File::create(&tmp_path).map_err(|e| store_error(e.to_string()))?;
                let mut writer = BufWriter::new(file);
                for record in &collection.records {
                    serde_json::to_writer(&mut writer, record)
                        .map_err(|e| store_error(e.to_string()))?;
                    writer.write_all(b"\n").map_err(|e| store_error(e.to_string()))?;
                }
                writer.flush().map_err(|e| store_error(e.to_string()))?;
                fs::rename(&tmp_path, &final_path).map_err(|e| store_error(e.to_string()))?;
                debug!(collection = %name, path = %final_path.display(), "persisted collection");
            }
            Ok(())
        })
        .await
        .map_err(|e| store_error(format!("persist task failed: {e}")))?
    }

    async fn snapshot(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().await.get(name).cloned()
    }
}

/// Cosine distance `1 - cos(a, b)`. Zero-magnitude vectors are at distance 1.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| store_error(format!("collection '{collection}' does not exist")))?;
        let store = Arc::make_mut(store);
        for record in records {
            store.upsert(record.clone());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.snapshot(collection).await.map_or(0, |c| c.records.len()))
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        restrict_to_ids: Option<&[String]>,
        k: usize,
    ) -> Result<RetrievalResult> {
        let Some(store) = self.snapshot(collection).await else {
            warn!(collection, "query against unknown collection");
            return Ok(RetrievalResult::empty());
        };
        if k == 0 || restrict_to_ids.is_some_and(<[String]>::is_empty) {
            return Ok(RetrievalResult::empty());
        }

        let embedding = embedding.to_vec();
        let restrict = restrict_to_ids.map(<[String]>::to_vec);
        tokio::task::spawn_blocking(move || store.nearest(&embedding, restrict.as_deref(), k))
            .await
            .map_err(|e| store_error(format!("query task failed: {e}")))
    }

    async fn get_by_id_prefix(&self, collection: &str, prefix: &str) -> Result<RetrievalResult> {
        let mut result = RetrievalResult::empty();
        let Some(store) = self.snapshot(collection).await else {
            return Ok(result);
        };
        let mut matching: Vec<&IndexRecord> =
            store.records.iter().filter(|r| r.id.starts_with(prefix)).collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        for record in matching {
            result.push(record.id.clone(), record.metadata.clone(), record.document.clone(), 0.0);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn record(id: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.into(),
            document: format!("synthesis {id}"),
            embedding,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn restricted_query_only_returns_listed_ids() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                &[record("1", vec![1.0, 0.0]), record("2", vec![0.9, 0.1]), record("3", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let ids = vec!["3".to_string(), "2".to_string(), "2".to_string(), "missing".to_string()];
        let result = store.query("c", &[1.0, 0.0], Some(&ids), 10).await.unwrap();
        assert_eq!(result.ids, ["2", "3"]);
        assert!(result.distances[0] <= result.distances[1]);

        let none = store.query("c", &[1.0, 0.0], Some(&[]), 10).await.unwrap();
        assert!(none.is_empty());
        let unknown = store.query("nope", &[1.0, 0.0], None, 10).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        store.upsert("c", &[record("1", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("c", &[record("1", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
        assert!(store.upsert("missing", &[]).await.is_err());
    }

    #[tokio::test]
    async fn prefix_lookup_and_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new();
        store.create_collection("review_synthesis", 2).await.unwrap();
        store
            .upsert(
                "review_synthesis",
                &[record("1001_1", vec![1.0, 0.0]), record("1001_0", vec![0.0, 1.0]), record("2002", vec![1.0, 1.0])],
            )
            .await
            .unwrap();
        store.persist_dir(dir.path()).await.unwrap();

        let loaded = InMemoryVectorStore::load_dir(dir.path()).unwrap();
        assert_eq!(loaded.count("review_synthesis").await.unwrap(), 3);
        let hits = loaded.get_by_id_prefix("review_synthesis", "1001").await.unwrap();
        assert_eq!(hits.ids, ["1001_0", "1001_1"]);
    }
}

//! In-memory [`VectorStore`]: a mapping from `(collection, doc_id)` to an
//! ordered segment list, with exhaustive cosine similarity for search.
//!
//! Grounded on the teacher's `search/vector.rs::VectorIndex` exhaustive
//! path and `HybridSearcher`, without the usearch HNSW index — this
//! backend is the spec's explicit degrade target when the vector extension
//! is unavailable.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::embeddings::cosine_similarity;
use crate::segment::Segment;

use super::{CachedSummary, Result, SearchHit, StoreError, StoreStats, VectorStore};

#[derive(Default)]
struct CollectionData {
    /// doc_id -> segments ordered by index
    documents: HashMap<String, Vec<Segment>>,
    summaries: HashMap<String, CachedSummary>,
    dim: Option<usize>,
}

/// A purely in-process [`VectorStore`]. No persistence across runs.
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CollectionData>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CollectionData>> {
        self.collections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn initialize(&self, collection: &str, dim: usize) -> Result<()> {
        let mut guard = self.lock();
        let entry = guard.entry(collection.to_string()).or_default();
        entry.dim = Some(dim);
        Ok(())
    }

    async fn has_document(&self, collection: &str, doc_id: &str) -> Result<bool> {
        let guard = self.lock();
        Ok(guard
            .get(collection)
            .map(|c| c.documents.contains_key(doc_id))
            .unwrap_or(false))
    }

    async fn upsert_segments(&self, collection: &str, segments: &[Segment]) -> Result<()> {
        if segments.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock();
        let entry = guard.entry(collection.to_string()).or_default();
        for segment in segments {
            let doc_segments = entry.documents.entry(segment.doc_id.clone()).or_default();
            if let Some(existing) = doc_segments.iter_mut().find(|s| s.id == segment.id) {
                *existing = segment.clone();
            } else {
                doc_segments.push(segment.clone());
            }
        }
        for docs in entry.documents.values_mut() {
            docs.sort_by_key(|s| s.index);
        }
        Ok(())
    }

    async fn get_document_segments(&self, collection: &str, doc_id: &str) -> Result<Vec<Segment>> {
        let guard = self.lock();
        Ok(guard
            .get(collection)
            .and_then(|c| c.documents.get(doc_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        doc_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let guard = self.lock();
        let Some(data) = guard.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        let docs_iter: Box<dyn Iterator<Item = &Vec<Segment>>> = match doc_id {
            Some(id) => Box::new(data.documents.get(id).into_iter()),
            None => Box::new(data.documents.values()),
        };

        for segments in docs_iter {
            for segment in segments {
                let Some(embedding) = &segment.embedding else { continue };
                let similarity = cosine_similarity(embedding, query_vector);
                hits.push(SearchHit {
                    segment: segment.clone(),
                    similarity,
                });
            }
        }

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn get_by_hash(
        &self,
        collection: &str,
        hashes: &[String],
    ) -> Result<HashMap<String, Segment>> {
        let guard = self.lock();
        let mut out = HashMap::new();
        if let Some(data) = guard.get(collection) {
            for segments in data.documents.values() {
                for segment in segments {
                    if hashes.contains(&segment.content_hash) {
                        out.insert(segment.content_hash.clone(), segment.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    async fn remove_stale(&self, collection: &str, doc_id: &str, keep_hashes: &[String]) -> Result<()> {
        let mut guard = self.lock();
        if let Some(data) = guard.get_mut(collection) {
            if let Some(segments) = data.documents.get_mut(doc_id) {
                segments.retain(|s| keep_hashes.contains(&s.content_hash));
            }
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()> {
        let mut guard = self.lock();
        if let Some(data) = guard.get_mut(collection) {
            data.documents.remove(doc_id);
        }
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let mut guard = self.lock();
        guard.remove(collection);
        Ok(())
    }

    async fn get_cached_summary(&self, collection: &str, fingerprint: &str) -> Result<Option<CachedSummary>> {
        let guard = self.lock();
        Ok(guard
            .get(collection)
            .and_then(|c| c.summaries.get(fingerprint))
            .cloned())
    }

    async fn cache_summary(&self, collection: &str, fingerprint: &str, summary_json: &str) -> Result<()> {
        let mut guard = self.lock();
        let entry = guard.entry(collection.to_string()).or_default();
        entry.summaries.insert(
            fingerprint.to_string(),
            CachedSummary {
                fingerprint: fingerprint.to_string(),
                summary_json: summary_json.to_string(),
                created_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let guard = self.lock();
        let mut stats = StoreStats {
            collections: guard.len(),
            ..StoreStats::default()
        };
        for data in guard.values() {
            stats.documents += data.documents.len();
            stats.segments += data.documents.values().map(|v| v.len()).sum::<usize>();
            stats.cached_summaries += data.summaries.len();
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentType;

    fn seg(doc: &str, idx: usize, text: &str) -> Segment {
        let mut s = Segment::new(doc, idx, 0, text.len(), SegmentType::Paragraph, 0, None, text);
        s.embedding = Some(vec![1.0, 0.0]);
        s
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_by_id() {
        let store = MemoryStore::new();
        store.initialize("col", 2).await.unwrap();
        let segs = vec![seg("doc1", 0, "a"), seg("doc1", 1, "b")];
        store.upsert_segments("col", &segs).await.unwrap();
        let fetched = store.get_document_segments("col", "doc1").await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].index, 0);
    }

    #[tokio::test]
    async fn repeated_upsert_is_idempotent_by_id() {
        let store = MemoryStore::new();
        store.initialize("col", 2).await.unwrap();
        let segs = vec![seg("doc1", 0, "a")];
        store.upsert_segments("col", &segs).await.unwrap();
        store.upsert_segments("col", &segs).await.unwrap();
        let fetched = store.get_document_segments("col", "doc1").await.unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[tokio::test]
    async fn has_document_reflects_presence() {
        let store = MemoryStore::new();
        store.initialize("col", 2).await.unwrap();
        assert!(!store.has_document("col", "doc1").await.unwrap());
        store.upsert_segments("col", &[seg("doc1", 0, "a")]).await.unwrap();
        assert!(store.has_document("col", "doc1").await.unwrap());
    }

    #[tokio::test]
    async fn search_returns_top_k_by_similarity() {
        let store = MemoryStore::new();
        store.initialize("col", 2).await.unwrap();
        store
            .upsert_segments("col", &[seg("doc1", 0, "a"), seg("doc1", 1, "b")])
            .await
            .unwrap();
        let hits = store
            .search("col", &[1.0, 0.0], 1, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn cache_summary_round_trips() {
        let store = MemoryStore::new();
        store.cache_summary("col", "fp1", "{}").await.unwrap();
        let cached = store.get_cached_summary("col", "fp1").await.unwrap();
        assert!(cached.is_some());
    }
}

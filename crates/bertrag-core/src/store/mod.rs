//! The [`VectorStore`] capability interface: durable segment and summary
//! storage plus ANN search, with two implementations behind the same
//! contract — [`memory::MemoryStore`] and, behind the `vector-search` +
//! `bundled-sqlite` features, [`sqlite::SqliteStore`].
//!
//! The disk-backed implementation owns a writer/reader connection pair so
//! the type stays `Send + Sync` without a single global lock, paired with an
//! HNSW index doing key<->id bookkeeping with a reserve-before-add
//! discipline.

pub mod memory;
#[cfg(all(feature = "bundled-sqlite", feature = "vector-search"))]
pub mod migrations;
#[cfg(all(feature = "bundled-sqlite", feature = "vector-search"))]
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::segment::Segment;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store corrupted: {0}")]
    Corruption(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A cached summary record, keyed by synthesis fingerprint.
#[derive(Debug, Clone)]
pub struct CachedSummary {
    pub fingerprint: String,
    pub summary_json: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregate store statistics, for maintenance/diagnostics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub collections: usize,
    pub documents: usize,
    pub segments: usize,
    pub cached_summaries: usize,
}

/// A segment search hit: the stored segment plus the similarity computed
/// against the query vector.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub segment: Segment,
    pub similarity: f32,
}

/// Durable segment and summary storage plus ANN search. Every operation is
/// async and cancellable, batched internally where it matters (upserts in
/// groups, bulk delete dropping/recreating the HNSW index).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent: creates schema/index for `collection` if absent.
    async fn initialize(&self, collection: &str, dim: usize) -> Result<()>;

    async fn has_document(&self, collection: &str, doc_id: &str) -> Result<bool>;

    /// Upserts by segment id; no partial writes are visible to concurrent
    /// readers (each batch commits as a unit).
    async fn upsert_segments(&self, collection: &str, segments: &[Segment]) -> Result<()>;

    /// Returns segments ordered by document index.
    async fn get_document_segments(&self, collection: &str, doc_id: &str) -> Result<Vec<Segment>>;

    /// Returns the `k` nearest segments by cosine similarity, optionally
    /// filtered to one document. Sets each hit's `similarity` to `1 -
    /// distance`.
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        doc_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>>;

    /// Batch lookup by content hash, for reusing embeddings across runs.
    async fn get_by_hash(
        &self,
        collection: &str,
        hashes: &[String],
    ) -> Result<std::collections::HashMap<String, Segment>>;

    /// Deletes segments of `doc_id` whose content hash is not in
    /// `keep_hashes`.
    async fn remove_stale(
        &self,
        collection: &str,
        doc_id: &str,
        keep_hashes: &[String],
    ) -> Result<()>;

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()>;

    async fn delete_collection(&self, collection: &str) -> Result<()>;

    async fn get_cached_summary(
        &self,
        collection: &str,
        fingerprint: &str,
    ) -> Result<Option<CachedSummary>>;

    async fn cache_summary(
        &self,
        collection: &str,
        fingerprint: &str,
        summary_json: &str,
    ) -> Result<()>;

    async fn vacuum(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

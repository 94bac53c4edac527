//! The [`Embedder`] capability interface and vector utilities shared by
//! extraction and retrieval.
//!
//! Grounded on the teacher's `embeddings/local.rs` (cosine similarity,
//! Matryoshka truncation, batching) generalized behind an `#[async_trait]`
//! interface in the shape of `llmspell-providers::ProviderInstance`, so any
//! embedding backend — not only the bundled local one — can sit behind it.

#[cfg(feature = "embeddings")]
pub mod local;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failures an [`Embedder`] can surface. The orchestrator treats all of
/// these as "embedder unavailable" and degrades the run to salience-only
/// retrieval rather than failing outright.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model initialization failed: {0}")]
    ModelInit(String),
    #[error("embedding request failed: {0}")]
    EmbeddingFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Maps text to a fixed-dimension, L2-normalized vector. Batched and
/// stateless from the caller's point of view — implementations may cache a
/// loaded model internally, but every call is independent.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The output vector dimension, `D`.
    fn dimensions(&self) -> usize;

    /// A stable name identifying the embedding model, folded into the
    /// orchestrator's pre-retrieval cache key so a model change always
    /// invalidates cached summaries.
    fn model_name(&self) -> &str;

    /// Embed a single string.
    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>>;

    /// Embed a batch of strings in one call. The default implementation
    /// embeds sequentially; real backends should override this to exploit
    /// batched inference.
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            if cancel.is_cancelled() {
                return Err(EmbeddingError::Cancelled);
            }
            out.push(self.embed(text, cancel).await?);
        }
        Ok(out)
    }
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

pub fn is_normalized(vector: &[f32]) -> bool {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    (norm - 1.0).abs() < 1e-3
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Returns `0.0` for mismatched lengths or zero vectors rather than
/// panicking, since retrieval must stay total over arbitrary stored data.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Truncate an embedding to `dim` dimensions and re-normalize (Matryoshka
/// Representation Learning). The teacher hardcodes `dim = 256`; here `D` is
/// a configuration value rather than a crate constant.
pub fn matryoshka_truncate(vector: &[f32], dim: usize) -> Vec<f32> {
    let mut truncated: Vec<f32> = vector.iter().take(dim).copied().collect();
    normalize(&mut truncated);
    truncated
}

/// A no-op embedder used when the `embeddings` feature is disabled or no
/// backend is configured. Always reports unavailable, so callers hit the
/// degrade-to-salience-only path deterministically instead of silently
/// returning zero vectors.
pub struct NullEmbedder {
    dim: usize,
}

impl NullEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for NullEmbedder {
    fn dimensions(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "null-embedder"
    }

    async fn embed(&self, _text: &str, _cancel: &CancellationToken) -> Result<Vec<f32>> {
        Err(EmbeddingError::ModelInit("no embedder configured".to_string()))
    }
}

/// Wraps any [`Embedder`] with an LRU cache over single-text [`Embedder::embed`]
/// calls, keyed by exact text. Repeated focus queries across calls to
/// [`crate::orchestrator::Orchestrator::summarize`] (the common case for an
/// interactive caller re-running the same question against one document, or
/// the same question across documents) skip re-embedding entirely.
///
/// Deliberately does not cache [`Embedder::embed_batch`], since extraction
/// batches are made of distinct segment texts that rarely repeat verbatim
/// across runs — the cache only pays for itself on the query path.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(text) {
            return Ok(cached.clone());
        }
        let embedding = self.inner.embed(text, cancel).await?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-5);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!(is_normalized(&v));
    }

    #[test]
    fn matryoshka_truncate_shrinks_and_renormalizes() {
        let v: Vec<f32> = (0..8).map(|i| i as f32 + 1.0).collect();
        let truncated = matryoshka_truncate(&v, 4);
        assert_eq!(truncated.len(), 4);
        assert!(is_normalized(&truncated));
    }

    struct CountingEmbedder {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            2
        }
        fn model_name(&self) -> &str {
            "counting"
        }
        async fn embed(&self, _text: &str, _cancel: &CancellationToken) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn caching_embedder_reuses_result_for_repeated_text() {
        let inner = Arc::new(CountingEmbedder { calls: std::sync::atomic::AtomicUsize::new(0) });
        let cached = CachingEmbedder::new(inner.clone(), 8);
        let cancel = CancellationToken::new();

        cached.embed("who is mary?", &cancel).await.unwrap();
        cached.embed("who is mary?", &cancel).await.unwrap();
        cached.embed("who is holmes?", &cancel).await.unwrap();

        assert_eq!(inner.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}

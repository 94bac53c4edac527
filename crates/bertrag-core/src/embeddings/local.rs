//! Local, fastembed-backed [`Embedder`] implementation.
//!
//! Uses fastembed's ONNX runtime for fully local inference — no network
//! calls. Grounded directly on the teacher's `embeddings/local.rs`: same
//! model family (Nomic Embed Text v1.5, 768-dim native), same global
//! `OnceLock` model cache, same `directories`-based cache-path resolution.
//! Generalized from the teacher's hardcoded 256-dim truncation to a
//! configurable Matryoshka dimension, since retrieval here treats `D` as a
//! configuration value.

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio_util::sync::CancellationToken;

use super::{matryoshka_truncate, Embedder, EmbeddingError, Result};

/// Native output dimension of the bundled Nomic Embed Text v1.5 model,
/// before Matryoshka truncation.
const NATIVE_DIMENSIONS: usize = 768;

/// Maximum text length submitted to the model; longer text is truncated.
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Default batch size for [`Embedder::embed_batch`].
pub const BATCH_SIZE: usize = 32;

static EMBEDDING_MODEL_RESULT: OnceLock<std::result::Result<Mutex<TextEmbedding>, String>> =
    OnceLock::new();

fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "bertrag", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/bertrag/fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> std::result::Result<&'static Mutex<TextEmbedding>, String> {
    EMBEDDING_MODEL_RESULT
        .get_or_init(|| {
            let cache_dir = get_cache_dir();
            tracing::info!(cache_dir = %cache_dir.display(), "initializing fastembed model");
            let init = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(false);
            TextEmbedding::try_new(init)
                .map(Mutex::new)
                .map_err(|e| format!("fastembed model init failed: {e}"))
        })
        .as_ref()
        .map_err(|e| e.clone())
}

/// A local, ONNX-backed [`Embedder`] truncating to a configurable
/// Matryoshka dimension.
pub struct LocalFastembedEmbedder {
    dimensions: usize,
}

impl LocalFastembedEmbedder {
    /// `dimensions` must be `<= NATIVE_DIMENSIONS`; values above that are
    /// clamped, matching the teacher's truncate-not-pad discipline.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.min(NATIVE_DIMENSIONS),
        }
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = get_model().map_err(EmbeddingError::ModelInit)?;
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| {
                if t.len() > MAX_TEXT_LENGTH {
                    t.chars().take(MAX_TEXT_LENGTH).collect()
                } else {
                    t.clone()
                }
            })
            .collect();
        let guard = model
            .lock()
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("model mutex poisoned: {e}")))?;
        let refs: Vec<&str> = truncated.iter().map(|s| s.as_str()).collect();
        let raw = guard
            .embed(refs, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;
        Ok(raw
            .into_iter()
            .map(|v| matryoshka_truncate(&v, self.dimensions))
            .collect())
    }
}

#[async_trait]
impl Embedder for LocalFastembedEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "nomic-embed-text-v1.5"
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>> {
        if cancel.is_cancelled() {
            return Err(EmbeddingError::Cancelled);
        }
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }
        let text = text.to_string();
        let dim = self.dimensions;
        tokio::task::spawn_blocking(move || {
            let embedder = LocalFastembedEmbedder { dimensions: dim };
            embedder.embed_texts(&[text]).map(|mut v| v.remove(0))
        })
        .await
        .map_err(|e| EmbeddingError::EmbeddingFailed(format!("join error: {e}")))?
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        if cancel.is_cancelled() {
            return Err(EmbeddingError::Cancelled);
        }
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            if cancel.is_cancelled() {
                return Err(EmbeddingError::Cancelled);
            }
            let chunk_owned = chunk.to_vec();
            let dim = self.dimensions;
            let embedded = tokio::task::spawn_blocking(move || {
                let embedder = LocalFastembedEmbedder { dimensions: dim };
                embedder.embed_texts(&chunk_owned)
            })
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("join error: {e}")))??;
            out.extend(embedded);
            tokio::task::yield_now().await;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_dimensions_to_native_ceiling() {
        let embedder = LocalFastembedEmbedder::new(4096);
        assert_eq!(embedder.dimensions(), NATIVE_DIMENSIONS);
    }

    #[test]
    fn accepts_configured_dimension_under_ceiling() {
        let embedder = LocalFastembedEmbedder::new(384);
        assert_eq!(embedder.dimensions(), 384);
    }
}

//! The configuration surface: plain `serde`-deserializable structs
//! aggregating the extraction, retrieval, store, and template knobs a
//! caller can tune per run.
//!
//! No config-file parsing crate is added — the teacher has none either.
//! Configuration is constructed programmatically (`OrchestratorConfig::default()`
//! plus field overrides) or loaded from environment variables via
//! [`BertRagConfig::from_env`].

use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionConfig;
use crate::retrieval::RetrievalConfig;
use crate::synthesis::SummaryTemplate;

/// Which [`crate::store::VectorStore`] implementation the orchestrator
/// should construct when the caller doesn't supply one directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreBackend {
    Memory,
    Sqlite,
}

/// `bert_rag` settings: collection naming and persistence policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BertRagConfig {
    pub collection_name: String,
    pub persist_vectors: bool,
    pub reuse_existing_embeddings: bool,
    pub vector_store_backend: VectorStoreBackend,
}

/// Default collection name used when the caller does not configure one.
pub const DEFAULT_COLLECTION_NAME: &str = "documents";

impl Default for BertRagConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            persist_vectors: true,
            reuse_existing_embeddings: true,
            vector_store_backend: VectorStoreBackend::Memory,
        }
    }
}

impl BertRagConfig {
    /// Override the parts of this config present as `BERTRAG_*` environment
    /// variables, leaving unset fields at their current value. Mirrors the
    /// env-override style used elsewhere in the corpus for provider config,
    /// without requiring a dedicated config-file format.
    pub fn from_env(mut self) -> Self {
        if let Ok(name) = std::env::var("BERTRAG_COLLECTION_NAME") {
            if !name.trim().is_empty() {
                self.collection_name = name;
            }
        }
        if let Ok(flag) = std::env::var("BERTRAG_PERSIST_VECTORS") {
            if let Ok(parsed) = flag.parse() {
                self.persist_vectors = parsed;
            }
        }
        if let Ok(flag) = std::env::var("BERTRAG_REUSE_EMBEDDINGS") {
            if let Ok(parsed) = flag.parse() {
                self.reuse_existing_embeddings = parsed;
            }
        }
        if let Ok(backend) = std::env::var("BERTRAG_VECTOR_STORE_BACKEND") {
            self.vector_store_backend = match backend.to_lowercase().as_str() {
                "sqlite" => VectorStoreBackend::Sqlite,
                _ => VectorStoreBackend::Memory,
            };
        }
        self
    }
}

/// The full, aggregated configuration surface recognized by
/// [`crate::orchestrator::Orchestrator`]: extraction, retrieval, store, and
/// default template settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub extraction: ExtractionConfigDef,
    pub retrieval: RetrievalConfigDef,
    pub bert_rag: BertRagConfig,
    #[serde(skip, default = "SummaryTemplate::default_preset")]
    pub default_template: SummaryTemplate,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfigDef::default(),
            retrieval: RetrievalConfigDef::default(),
            bert_rag: BertRagConfig::default(),
            default_template: SummaryTemplate::default_preset(),
        }
    }
}

/// Serde-friendly mirror of [`ExtractionConfig`] (which is not itself
/// `Serialize`/`Deserialize` since it's reconstructed fresh per run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfigDef {
    pub extraction_ratio: f32,
    pub min_segments: usize,
    pub max_segments: usize,
    pub embed_batch_size: usize,
    pub include_code_blocks: bool,
    pub include_list_items: bool,
}

impl Default for ExtractionConfigDef {
    fn default() -> Self {
        let d = ExtractionConfig::default();
        Self {
            extraction_ratio: d.extraction_ratio,
            min_segments: d.min_segments,
            max_segments: d.max_segments,
            embed_batch_size: d.embed_batch_size,
            include_code_blocks: d.include_code_blocks,
            include_list_items: d.include_list_items,
        }
    }
}

impl From<&ExtractionConfigDef> for ExtractionConfig {
    fn from(def: &ExtractionConfigDef) -> Self {
        ExtractionConfig {
            extraction_ratio: def.extraction_ratio,
            min_segments: def.min_segments,
            max_segments: def.max_segments,
            embed_batch_size: def.embed_batch_size,
            include_code_blocks: def.include_code_blocks,
            include_list_items: def.include_list_items,
            ..ExtractionConfig::default()
        }
    }
}

/// Serde-friendly mirror of [`RetrievalConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfigDef {
    pub top_k: usize,
    pub min_top_k: usize,
    pub max_top_k: usize,
    pub alpha: f32,
    pub use_rrf: bool,
    pub use_hybrid_search: bool,
    pub rrf_k: f32,
    pub fallback_count: usize,
    pub min_similarity: f32,
    pub adaptive_top_k: bool,
    pub min_coverage_percent: f32,
    pub narrative_boost: f32,
}

impl Default for RetrievalConfigDef {
    fn default() -> Self {
        let d = RetrievalConfig::default();
        Self {
            top_k: d.top_k,
            min_top_k: d.min_top_k,
            max_top_k: d.max_top_k,
            alpha: d.alpha,
            use_rrf: d.use_rrf,
            use_hybrid_search: d.use_hybrid_search,
            rrf_k: d.rrf_k,
            fallback_count: d.fallback_count,
            min_similarity: d.min_similarity,
            adaptive_top_k: d.adaptive_top_k,
            min_coverage_percent: d.min_coverage_percent,
            narrative_boost: d.narrative_boost,
        }
    }
}

impl From<&RetrievalConfigDef> for RetrievalConfig {
    fn from(def: &RetrievalConfigDef) -> Self {
        RetrievalConfig {
            top_k: def.top_k,
            min_top_k: def.min_top_k,
            max_top_k: def.max_top_k,
            alpha: def.alpha,
            use_rrf: def.use_rrf,
            use_hybrid_search: def.use_hybrid_search,
            rrf_k: def.rrf_k,
            fallback_count: def.fallback_count,
            min_similarity: def.min_similarity,
            adaptive_top_k: def.adaptive_top_k,
            min_coverage_percent: def.min_coverage_percent,
            narrative_boost: def.narrative_boost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_into_runtime_types() {
        let cfg = OrchestratorConfig::default();
        let extraction: ExtractionConfig = (&cfg.extraction).into();
        let retrieval: RetrievalConfig = (&cfg.retrieval).into();
        assert_eq!(extraction.min_segments, ExtractionConfig::default().min_segments);
        assert_eq!(retrieval.top_k, RetrievalConfig::default().top_k);
    }

    #[test]
    fn bert_rag_config_defaults_to_memory_backend() {
        let cfg = BertRagConfig::default();
        assert_eq!(cfg.vector_store_backend, VectorStoreBackend::Memory);
        assert_eq!(cfg.collection_name, DEFAULT_COLLECTION_NAME);
    }
}

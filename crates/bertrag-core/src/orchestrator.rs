//! [`Orchestrator`]: the top-level engine. Owns cache-key derivation and the
//! three-phase pipeline (extract-or-load -> retrieve -> synthesize-or-reuse).
//!
//! Grounded structurally on the teacher's `Storage` (owns the
//! writer/reader connections, embedding service, and vector index behind one
//! "construct once, call many times" handle) — this crate's `Orchestrator`
//! follows the same shape for its store/embedder/generator handles, without
//! the cyclic references a class-inheritance port would otherwise carry (see
//! `DESIGN.md`, "no cyclic references").

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use serde::{Deserialize, Serialize};

use crate::config::{BertRagConfig, OrchestratorConfig};
use crate::embeddings::{CachingEmbedder, Embedder};
use crate::error::{OrchestratorError, Result};
use crate::extraction::{ExtractionConfig, SegmentExtractor};
use crate::hash;
use crate::retrieval::{RetrievalConfig, Retrieved, Retriever};
use crate::segment::{ContentType, ExtractionResult, Segment};
use crate::store::VectorStore;
use crate::synthesis::{DocumentSummary, Generator, SummaryTemplate, Synthesizer};

/// The orchestrator's JSON-facing request shape, analogous to the teacher's
/// `IngestInput`: `deny_unknown_fields` rejects field-injection at the
/// boundary rather than silently ignoring typos in caller-supplied JSON.
/// Internal types (`Segment`, `ExtractionResult`) carry no such guard, since
/// they are never deserialized from untrusted input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngestDocument {
    pub markdown: String,
    pub filename: String,
    #[serde(default)]
    pub query: Option<String>,
    /// One of [`SummaryTemplate::by_name`]'s preset names; unrecognized or
    /// absent falls back to `default`.
    #[serde(default)]
    pub template: Option<String>,
}

/// Pipeline version folded into the pre-retrieval cache key. Bump this any
/// time an algorithmic change (salience weights, RRF formula, prompt
/// structure) would otherwise silently reuse a stale cached summary.
pub const PIPELINE_VERSION: &str = "bertrag-1";

/// Capacity of the query-embedding LRU cache every configured [`Embedder`]
/// is wrapped in; see [`CachingEmbedder`].
const QUERY_EMBEDDING_CACHE_CAPACITY: usize = 256;

/// The top-level engine: owns the store/embedder/generator handles and ties
/// extraction, retrieval, and synthesis into one cancellable run.
pub struct Orchestrator {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Option<Arc<dyn VectorStore>>,
        embedder: Option<Arc<dyn Embedder>>,
        generator: Option<Arc<dyn Generator>>,
        config: OrchestratorConfig,
    ) -> Self {
        let embedder = embedder.map(|e| {
            Arc::new(CachingEmbedder::new(e, QUERY_EMBEDDING_CACHE_CAPACITY)) as Arc<dyn Embedder>
        });
        Self { store, embedder, generator, config }
    }

    fn bert_rag(&self) -> &BertRagConfig {
        &self.config.bert_rag
    }

    /// Entry point for a caller-supplied JSON request: resolves the named
    /// template (falling back to the configured default for anything
    /// unrecognized) and delegates to [`Orchestrator::summarize`].
    pub async fn summarize_request(
        &self,
        request: IngestDocument,
        cancel: &CancellationToken,
    ) -> Result<DocumentSummary> {
        let template = request
            .template
            .as_deref()
            .and_then(SummaryTemplate::by_name)
            .unwrap_or_else(|| self.config.default_template.clone());

        self.summarize(
            &request.markdown,
            &request.filename,
            request.query.as_deref(),
            &template,
            cancel,
        )
        .await
    }

    /// End-to-end flow, spec §4.7:
    ///
    /// 1. Canonicalize + hash markdown -> `content_hash`; derive `stable_doc_id`.
    /// 2. Reuse segments from the store if configured and present; else extract (+ persist).
    /// 3. Empty extraction -> empty summary, `coverage = 0`.
    /// 4. Retrieve.
    /// 5. Synthesis-key cache lookup; return on hit.
    /// 6. Synthesize, persist under the synthesis key, return.
    pub async fn summarize(
        &self,
        markdown: &str,
        filename: &str,
        query: Option<&str>,
        template: &SummaryTemplate,
        cancel: &CancellationToken,
    ) -> Result<DocumentSummary> {
        let content_hash = hash::content_hash(markdown);
        let stable_doc_id = format!("{}_{}", hash::sanitize(filename), content_hash);

        if markdown.trim().is_empty() {
            return Ok(empty_summary(&stable_doc_id));
        }

        let collection = self.bert_rag().collection_name.clone();
        let dim = self.embedder.as_ref().map(|e| e.dimensions()).unwrap_or(384);

        let extraction = self
            .extract_or_load(markdown, &stable_doc_id, &collection, dim, cancel)
            .await?;

        if extraction.total_segments() == 0 {
            return Ok(empty_summary(&stable_doc_id));
        }

        let retriever = Retriever::new(self.config.retrieval_runtime());
        let retrieved = retriever
            .retrieve(&extraction, query, self.embedder.as_deref(), cancel)
            .await;

        let pre_key = self.pre_retrieval_key(&content_hash, query, template);
        let synthesis_key = synthesis_key(&pre_key, &retrieved);

        if let Some(store) = &self.store {
            if let Ok(Some(cached)) = store.get_cached_summary(&collection, &synthesis_key).await {
                if let Ok(summary) = serde_json::from_str::<DocumentSummary>(&cached.summary_json) {
                    tracing::debug!(key = %synthesis_key, "synthesis cache hit");
                    return Ok(summary);
                }
            }
        }

        let title = crate::synthesis::prompt::extract_title(&extraction.all_segments, filename);
        let synthesizer = Synthesizer::new(self.generator.as_deref());
        let summary = synthesizer
            .synthesize(
                &stable_doc_id,
                &title,
                &retrieved,
                extraction.total_segments(),
                extraction.content_type,
                template,
                cancel,
            )
            .await?;

        if let Some(store) = &self.store {
            if let Ok(json) = serde_json::to_string(&summary) {
                if let Err(err) = store.cache_summary(&collection, &synthesis_key, &json).await {
                    tracing::warn!(error = %err, "failed to persist summary cache entry");
                }
            }
        }

        Ok(summary)
    }

    async fn extract_or_load(
        &self,
        markdown: &str,
        doc_id: &str,
        collection: &str,
        dim: usize,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let extraction_cfg: ExtractionConfig = (&self.config.extraction).into();

        if let Some(store) = &self.store {
            if self.bert_rag().reuse_existing_embeddings {
                if let Err(err) = store.initialize(collection, dim).await {
                    tracing::warn!(error = %err, "vector store initialization failed; continuing without persistence");
                } else if let Ok(true) = store.has_document(collection, doc_id).await {
                    let segments = store
                        .get_document_segments(collection, doc_id)
                        .await
                        .map_err(|e| OrchestratorError::StoreUnavailable(e.to_string()))?;
                    if !segments.is_empty() {
                        tracing::debug!(doc_id, "loaded segments from store; skipping re-extraction");
                        return Ok(rebuild_extraction_result(segments, markdown, &extraction_cfg));
                    }
                }
            }
        }

        let extractor = SegmentExtractor::new(self.embedder.clone(), extraction_cfg);
        let extraction = extractor.extract(markdown, doc_id, cancel).await?;

        if let Some(store) = &self.store {
            if self.bert_rag().persist_vectors {
                if let Err(err) = store.upsert_segments(collection, &extraction.all_segments).await {
                    tracing::warn!(error = %err, "failed to persist extracted segments");
                } else {
                    let hashes: Vec<String> =
                        extraction.all_segments.iter().map(|s| s.content_hash.clone()).collect();
                    if let Err(err) = store.remove_stale(collection, doc_id, &hashes).await {
                        tracing::warn!(error = %err, "failed to prune stale segments");
                    }
                }
            }
        }

        Ok(extraction)
    }

    /// `hash(pipeline_version, content_hash, query_hash_or_"noquery",
    /// template_fingerprint, retrieval_fingerprint, embedding_model_fingerprint,
    /// generator_model_name)`.
    fn pre_retrieval_key(&self, content_hash: &str, query: Option<&str>, template: &SummaryTemplate) -> String {
        let query_component = match query.filter(|q| !q.trim().is_empty()) {
            Some(q) => hash::content_hash(q),
            None => "noquery".to_string(),
        };
        let template_fingerprint = template_fingerprint(template);
        let retrieval_fingerprint = retrieval_fingerprint(&self.config.retrieval);
        let embedding_model_fingerprint =
            self.embedder.as_ref().map(|e| e.model_name().to_string()).unwrap_or_else(|| "no-embedder".to_string());
        let generator_model_name =
            self.generator.as_ref().map(|g| g.model_name().to_string()).unwrap_or_else(|| "no-generator".to_string());

        hash::hash_joined([
            PIPELINE_VERSION,
            content_hash,
            query_component.as_str(),
            template_fingerprint.as_str(),
            retrieval_fingerprint.as_str(),
            embedding_model_fingerprint.as_str(),
            generator_model_name.as_str(),
        ])
    }
}

impl OrchestratorConfig {
    fn retrieval_runtime(&self) -> RetrievalConfig {
        (&self.retrieval).into()
    }
}

fn template_fingerprint(template: &SummaryTemplate) -> String {
    hash::hash_joined([
        template.name.as_str(),
        &template.target_words.to_string(),
        &format!("{:?}", template.output_style),
        &template.max_bullets.to_string(),
        &template.include_coverage_metadata.to_string(),
        template.executive_prompt_template.as_deref().unwrap_or(""),
    ])
}

fn retrieval_fingerprint(cfg: &crate::config::RetrievalConfigDef) -> String {
    hash::hash_joined([
        &cfg.top_k.to_string(),
        &cfg.min_top_k.to_string(),
        &cfg.max_top_k.to_string(),
        &cfg.alpha.to_string(),
        &cfg.use_rrf.to_string(),
        &cfg.use_hybrid_search.to_string(),
        &cfg.rrf_k.to_string(),
        &cfg.fallback_count.to_string(),
        &cfg.min_similarity.to_string(),
        &cfg.adaptive_top_k.to_string(),
        &cfg.min_coverage_percent.to_string(),
        &cfg.narrative_boost.to_string(),
    ])
}

/// `pre_retrieval_key + hash("n=" + count + ":" + join(sorted(content_hashes), "_"))`.
/// Sorting by content hash makes the key order-insensitive: any permutation
/// of the same retrieved set with the same count hashes identically.
fn synthesis_key(pre_retrieval_key: &str, retrieved: &[Retrieved]) -> String {
    let mut hashes: Vec<&str> = retrieved.iter().map(|r| r.segment.content_hash.as_str()).collect();
    hashes.sort_unstable();
    let evidence_component = format!("n={}:{}", retrieved.len(), hashes.join("_"));
    format!("{pre_retrieval_key}{}", hash::hash_joined([evidence_component.as_str()]))
}

/// Reconstruct an [`ExtractionResult`] from segments loaded back from the
/// store. `top_by_salience` isn't persisted, so it's recomputed from the
/// stored salience scores using the same ratio/min/max rule extraction uses.
fn rebuild_extraction_result(
    mut segments: Vec<Segment>,
    markdown: &str,
    cfg: &ExtractionConfig,
) -> ExtractionResult {
    segments.sort_by_key(|s| s.index);
    let content_type = crate::extraction::detect_content_type(markdown);
    let total = segments.len();

    let mut ranked: Vec<usize> = (0..segments.len()).collect();
    ranked.sort_by(|&a, &b| {
        segments[b]
            .salience
            .partial_cmp(&segments[a].salience)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let target = ((cfg.extraction_ratio * total as f32).ceil() as usize)
        .max(cfg.min_segments)
        .min(cfg.max_segments)
        .min(total);
    ranked.truncate(target);

    ExtractionResult::new(segments, ranked, content_type, Duration::from_millis(0))
}

fn empty_summary(doc_id: &str) -> DocumentSummary {
    use crate::synthesis::{Entities, Trace};
    DocumentSummary {
        executive_summary: "No content was available to summarize.".to_string(),
        topic_summaries: Vec::new(),
        open_questions: Vec::new(),
        trace: Trace {
            document_id: doc_id.to_string(),
            total_segments: 0,
            retrieved_count: 0,
            headings: Vec::new(),
            elapsed_ms: 0,
            coverage_score: 0.0,
            citation_rate: 0.0,
        },
        entities: Entities::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::synthesis::StaticGenerator;

    fn orchestrator_with(generator: Option<Arc<dyn Generator>>) -> Orchestrator {
        Orchestrator::new(
            Some(Arc::new(MemoryStore::new())),
            None,
            generator,
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn empty_document_yields_zero_coverage_without_crashing() {
        let orchestrator = orchestrator_with(None);
        let summary = orchestrator
            .summarize("   ", "doc.md", None, &SummaryTemplate::default_preset(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.trace.coverage_score, 0.0);
    }

    #[tokio::test]
    async fn tiny_expository_document_produces_extractive_summary_with_full_coverage() {
        let orchestrator = orchestrator_with(None);
        let md = "# Title\n\nA short paragraph about widgets. Another sentence about widgets.\n";
        let summary = orchestrator
            .summarize(md, "doc.md", None, &SummaryTemplate::default_preset(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(summary.executive_summary.to_lowercase().contains("widgets"));
        assert_eq!(summary.trace.coverage_score, 1.0);
        assert_eq!(summary.trace.citation_rate, 1.0);
    }

    #[tokio::test]
    async fn repeated_run_with_identical_config_hits_the_summary_cache() {
        let generator: Arc<dyn Generator> = Arc::new(StaticGenerator::new("A summary about widgets."));
        let orchestrator = orchestrator_with(Some(generator));
        let md = "# Title\n\nA short paragraph about widgets. Another sentence about widgets.\n";
        let template = SummaryTemplate::default_preset();
        let cancel = CancellationToken::new();

        let first = orchestrator.summarize(md, "doc.md", None, &template, &cancel).await.unwrap();
        let second = orchestrator.summarize(md, "doc.md", None, &template, &cancel).await.unwrap();
        assert_eq!(first.executive_summary, second.executive_summary);
    }

    #[tokio::test]
    async fn template_change_changes_the_synthesis_key() {
        let orchestrator = orchestrator_with(None);
        let brief = SummaryTemplate::brief();
        let bookreport = SummaryTemplate::bookreport();
        let key_a = orchestrator.pre_retrieval_key("hash", None, &brief);
        let key_b = orchestrator.pre_retrieval_key("hash", None, &bookreport);
        assert_ne!(key_a, key_b);
    }

    #[tokio::test]
    async fn summarize_request_resolves_named_template_and_rejects_unknown_json_fields() {
        let orchestrator = orchestrator_with(None);
        let request = IngestDocument {
            markdown: "# Title\n\nA short paragraph about widgets. Another sentence about widgets.\n"
                .to_string(),
            filename: "doc.md".to_string(),
            query: None,
            template: Some("brief".to_string()),
        };
        let summary = orchestrator.summarize_request(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(summary.trace.coverage_score, 1.0);

        let rejected: std::result::Result<IngestDocument, _> =
            serde_json::from_str(r#"{"markdown":"x","filename":"f","unexpectedField":true}"#);
        assert!(rejected.is_err());
    }

    #[test]
    fn synthesis_key_is_order_insensitive_over_identical_content_hashes() {
        use crate::segment::SegmentType;

        let seg = |idx: usize, hash_seed: &str| {
            let mut s = Segment::new("d", idx, 0, 1, SegmentType::Paragraph, 0, None, hash_seed);
            s.content_hash = hash_seed.to_string();
            s
        };
        let forward = vec![
            Retrieved { segment: seg(0, "aaa"), query_similarity: None, retrieval_score: None },
            Retrieved { segment: seg(1, "bbb"), query_similarity: None, retrieval_score: None },
        ];
        let reversed = vec![
            Retrieved { segment: seg(1, "bbb"), query_similarity: None, retrieval_score: None },
            Retrieved { segment: seg(0, "aaa"), query_similarity: None, retrieval_score: None },
        ];
        assert_eq!(synthesis_key("pre", &forward), synthesis_key("pre", &reversed));
    }
}

//! [`Retriever`]: turns an [`ExtractionResult`] and an optional focus query
//! into a ranked, document-ordered set of retrieved segments.
//!
//! RRF and hybrid RRF are grounded directly on the teacher's
//! `search/hybrid.rs`; weighted-sum (legacy) fusion is grounded on its
//! `linear_combination`. BM25 scoring for the hybrid path comes from
//! [`crate::bm25`].

pub mod rrf;

use tokio_util::sync::CancellationToken;

use crate::bm25::Bm25Index;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::segment::{ContentType, ExtractionResult, Segment};

/// Tunable retrieval knobs from the configuration surface.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
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

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            min_top_k: 5,
            max_top_k: 60,
            alpha: 0.6,
            use_rrf: true,
            use_hybrid_search: false,
            rrf_k: 60.0,
            fallback_count: 5,
            min_similarity: 0.2,
            adaptive_top_k: false,
            min_coverage_percent: 20.0,
            narrative_boost: 1.2,
        }
    }
}

/// A retrieved segment paired with the transient, retrieval-pass-scoped
/// fields the spec keeps off of [`Segment`] itself: `query_similarity` and
/// `retrieval_score` live here, indexed in parallel with the returned
/// segment list, owned by the retriever rather than the segment.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub segment: Segment,
    pub query_similarity: Option<f32>,
    pub retrieval_score: Option<f32>,
}

pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    fn effective_k(&self, total: usize, content_type: ContentType) -> usize {
        if !self.config.adaptive_top_k {
            return self.config.top_k.clamp(self.config.min_top_k, self.config.max_top_k);
        }
        let coverage_based =
            (total as f32 * self.config.min_coverage_percent / 100.0).ceil() as usize;
        let boosted = if content_type == ContentType::Narrative {
            (coverage_based as f32 * self.config.narrative_boost).ceil() as usize
        } else {
            coverage_based
        };
        boosted.clamp(self.config.min_top_k, self.config.max_top_k)
    }

    /// Retrieve from `extraction` with no focus query: the top-by-salience
    /// view, truncated to `effective_k`, re-sorted by document index.
    pub fn retrieve_no_query(&self, extraction: &ExtractionResult) -> Vec<Retrieved> {
        let effective_k = self.effective_k(extraction.total_segments(), extraction.content_type);
        let mut chosen: Vec<&Segment> = extraction.top_by_salience().take(effective_k).collect();
        chosen.sort_by_key(|s| s.index);
        chosen
            .into_iter()
            .map(|s| Retrieved {
                segment: s.clone(),
                query_similarity: None,
                retrieval_score: Some(s.salience),
            })
            .collect()
    }

    /// Retrieve from `extraction` for `query`, embedding it via `embedder`
    /// when available. Falls back to [`Retriever::retrieve_no_query`]
    /// (salience-only) when the embedder is unavailable.
    pub async fn retrieve(
        &self,
        extraction: &ExtractionResult,
        query: Option<&str>,
        embedder: Option<&dyn Embedder>,
        cancel: &CancellationToken,
    ) -> Vec<Retrieved> {
        let Some(query) = query.filter(|q| !q.trim().is_empty()) else {
            return self.retrieve_no_query(extraction);
        };

        let Some(embedder) = embedder else {
            tracing::warn!("query supplied but no embedder available; degrading to salience-only");
            return self.retrieve_no_query(extraction);
        };

        let query_embedding = match embedder.embed(query, cancel).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(error = %err, "query embedding failed; degrading to salience-only");
                return self.retrieve_no_query(extraction);
            }
        };

        let total = extraction.total_segments();
        let effective_k = self.effective_k(total, extraction.content_type);

        let query_similarity: Vec<Option<f32>> = extraction
            .all_segments
            .iter()
            .map(|s| s.embedding.as_ref().map(|e| cosine_similarity(e, &query_embedding)))
            .collect();

        let salience: Vec<f32> = extraction.all_segments.iter().map(|s| s.salience).collect();

        let (order, scores): (Vec<usize>, Vec<f32>) = if self.config.use_rrf {
            if self.config.use_hybrid_search {
                self.fuse_hybrid_rrf(extraction, query, &query_similarity)
            } else {
                self.fuse_rrf(&query_similarity, &salience)
            }
        } else {
            self.fuse_weighted_sum(&query_similarity, &salience)
        };

        let mut selected: Vec<usize> = order.into_iter().take(effective_k).collect();

        // fallback merge: union with up to fallback_count segments from
        // top_by_salience not already selected.
        let selected_set: std::collections::HashSet<usize> = selected.iter().copied().collect();
        let mut added = 0usize;
        for seg in extraction.top_by_salience() {
            if added >= self.config.fallback_count {
                break;
            }
            if !selected_set.contains(&seg.index) {
                selected.push(seg.index);
                added += 1;
            }
        }

        selected.sort();
        selected.dedup();

        selected
            .into_iter()
            .map(|idx| Retrieved {
                segment: extraction.all_segments[idx].clone(),
                query_similarity: query_similarity[idx],
                retrieval_score: scores.get(idx).copied(),
            })
            .collect()
    }

    fn fuse_weighted_sum(
        &self,
        query_similarity: &[Option<f32>],
        salience: &[f32],
    ) -> (Vec<usize>, Vec<f32>) {
        let mut scored: Vec<(usize, f32)> = query_similarity
            .iter()
            .enumerate()
            .filter_map(|(i, qs)| {
                let qs = (*qs)?;
                if qs < self.config.min_similarity {
                    return None;
                }
                Some((i, rrf::weighted_sum(qs, salience[i], self.config.alpha)))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
        });

        let mut dense_scores = vec![0.0f32; salience.len()];
        for &(i, s) in &scored {
            dense_scores[i] = s;
        }
        (scored.into_iter().map(|(i, _)| i).collect(), dense_scores)
    }

    /// Standard RRF over two rankings: query_similarity desc, salience desc.
    fn fuse_rrf(&self, query_similarity: &[Option<f32>], salience: &[f32]) -> (Vec<usize>, Vec<f32>) {
        let dense_ranking = rrf::rank_from_scores(query_similarity);
        let salience_scores: Vec<Option<f32>> = salience.iter().map(|&s| Some(s)).collect();
        let salience_ranking = rrf::rank_from_scores(&salience_scores);

        let fused = rrf::reciprocal_rank_fusion(&[dense_ranking, salience_ranking], self.config.rrf_k);
        let mut scores = vec![0.0f32; salience.len()];
        for &(i, s) in &fused {
            scores[i] = s;
        }
        (fused.into_iter().map(|(i, _)| i).collect(), scores)
    }

    /// Hybrid RRF over three rankings (dense, BM25, salience) for `query`.
    /// Exposed separately from [`Retriever::fuse_rrf`] because BM25 scoring
    /// needs the raw query text, not just per-segment similarity.
    pub fn fuse_hybrid_rrf(
        &self,
        extraction: &ExtractionResult,
        query: &str,
        query_similarity: &[Option<f32>],
    ) -> (Vec<usize>, Vec<f32>) {
        let dense_ranking = rrf::rank_from_scores(query_similarity);

        let salience: Vec<Option<f32>> =
            extraction.all_segments.iter().map(|s| Some(s.salience)).collect();
        let salience_ranking = rrf::rank_from_scores(&salience);

        let bm25 = Bm25Index::build(&extraction.all_segments);
        let bm25_scores: Vec<Option<f32>> =
            bm25.score(query).into_iter().map(Some).collect();
        let bm25_ranking = rrf::rank_from_scores(&bm25_scores);

        let fused =
            rrf::reciprocal_rank_fusion(&[dense_ranking, bm25_ranking, salience_ranking], self.config.rrf_k);
        let mut scores = vec![0.0f32; extraction.total_segments()];
        for &(i, s) in &fused {
            scores[i] = s;
        }
        (fused.into_iter().map(|(i, _)| i).collect(), scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentType;
    use std::time::Duration;

    fn seg(idx: usize, text: &str, salience: f32) -> Segment {
        let mut s = Segment::new("d", idx, 0, text.len(), SegmentType::Paragraph, 0, None, text);
        s.salience = salience;
        s
    }

    #[test]
    fn no_query_path_returns_document_ordered_segments() {
        let segs = vec![seg(0, "first segment here", 0.2), seg(1, "second segment here", 0.9)];
        let extraction = ExtractionResult::new(segs, vec![1, 0], ContentType::Unknown, Duration::from_millis(1));
        let retriever = Retriever::new(RetrievalConfig {
            top_k: 2,
            min_top_k: 1,
            ..RetrievalConfig::default()
        });
        let retrieved = retriever.retrieve_no_query(&extraction);
        assert_eq!(retrieved.len(), 2);
        assert!(retrieved[0].segment.index < retrieved[1].segment.index);
    }

    #[test]
    fn retrieved_count_never_exceeds_effective_k_plus_fallback() {
        let segs: Vec<Segment> = (0..10).map(|i| seg(i, "some segment text here please", 0.5)).collect();
        let extraction = ExtractionResult::new(segs, (0..10).collect(), ContentType::Unknown, Duration::from_millis(1));
        let retriever = Retriever::new(RetrievalConfig {
            top_k: 3,
            min_top_k: 1,
            fallback_count: 2,
            ..RetrievalConfig::default()
        });
        let retrieved = retriever.retrieve_no_query(&extraction);
        assert!(retrieved.len() <= 3 + 2);
    }
}

//! [`SegmentExtractor`]: computes embeddings and salience for every parsed
//! segment and assembles an [`ExtractionResult`].
//!
//! Salience is pure `f32` arithmetic. Embedding batching degrades gracefully
//! on embedder failure: an unavailable embedder never fails the surrounding
//! extraction, it just leaves the affected segments without an embedding.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::embeddings::Embedder;
use crate::parser::{self, ParseError, ParserOptions};
use crate::segment::{ContentType, ExtractionResult, Segment, SegmentType};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Narrative keyword head-sample heuristic: words that skew a document
/// toward "story" framing rather than expository/technical framing.
const NARRATIVE_KEYWORDS: &[&str] = &[
    "said", "chapter", "she", "he", "they walked", "once upon", "replied", "whispered",
    "shouted", "felt", "looked at", "her eyes", "his hand",
];

const EXPOSITORY_KEYWORDS: &[&str] = &[
    "therefore", "in conclusion", "the following", "defined as", "table", "figure", "section",
    "algorithm", "parameter", "configuration", "specification", "function", "returns",
];

/// How many leading characters of a document are sampled for content-type
/// classification.
const HEAD_SAMPLE_CHARS: usize = 2000;

/// Detect [`ContentType`] from a head sample of the document using
/// lightweight keyword counting.
pub fn detect_content_type(markdown: &str) -> ContentType {
    let sample: String = markdown.chars().take(HEAD_SAMPLE_CHARS).collect();
    let lower = sample.to_lowercase();
    let narrative_hits = NARRATIVE_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    let expository_hits = EXPOSITORY_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();

    if narrative_hits == 0 && expository_hits == 0 {
        ContentType::Unknown
    } else if narrative_hits > expository_hits {
        ContentType::Narrative
    } else if expository_hits > narrative_hits {
        ContentType::Expository
    } else {
        ContentType::Unknown
    }
}

/// Tunable extraction knobs from the configuration surface.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub extraction_ratio: f32,
    pub min_segments: usize,
    pub max_segments: usize,
    pub embed_batch_size: usize,
    pub include_code_blocks: bool,
    pub include_list_items: bool,
    /// Proportion of the document (by index) considered "intro".
    pub intro_threshold: f32,
    /// Proportion of the document (by index) after which segments are
    /// considered "conclusion".
    pub conclusion_threshold: f32,
    /// Number of segments above which BM25/salience loops yield
    /// cooperatively between chunks.
    pub cooperative_yield_threshold: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extraction_ratio: 0.3,
            min_segments: 5,
            max_segments: 200,
            embed_batch_size: 32,
            include_code_blocks: true,
            include_list_items: true,
            intro_threshold: 0.15,
            conclusion_threshold: 0.85,
            cooperative_yield_threshold: 4096,
        }
    }
}

const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "of", "to", "in", "on", "for",
    "with", "as", "at", "by", "from", "is", "are", "was", "were", "be", "been", "being", "this",
    "that", "these", "those", "it", "its", "into", "about", "than", "so", "not", "no", "do",
    "does", "did", "has", "have", "had", "i", "you", "he", "she", "we", "they",
];

/// Content-word ratio: fraction of whitespace-split tokens that are not
/// common function words. A cheap proxy for lexical density.
fn lexical_density(text: &str) -> f32 {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let content_words = tokens.iter().filter(|t| !FUNCTION_WORDS.contains(&t.as_str())).count();
    (content_words as f32 / tokens.len() as f32).clamp(0.0, 1.0)
}

fn position_weight(index: usize, total: usize, content_type: ContentType, cfg: &ExtractionConfig) -> f32 {
    if total <= 1 {
        return 1.0;
    }
    let relative = index as f32 / (total - 1).max(1) as f32;
    match content_type {
        ContentType::Expository => {
            if relative <= cfg.intro_threshold || relative >= cfg.conclusion_threshold {
                1.0
            } else {
                0.5
            }
        }
        ContentType::Narrative => {
            if relative > cfg.intro_threshold && relative < cfg.conclusion_threshold {
                1.0
            } else {
                0.6
            }
        }
        ContentType::Unknown => 0.75,
    }
}

fn structural_weight(segment: &Segment, index: usize, total: usize) -> f32 {
    let mut weight = match segment.segment_type {
        SegmentType::Heading => 1.0,
        _ => 0.4,
    };
    if total > 0 {
        let relative = index as f32 / total as f32;
        if relative < 0.1 {
            weight += 0.2;
        }
    }
    weight.clamp(0.0, 1.0)
}

fn length_penalty(text: &str) -> f32 {
    let len = text.chars().count();
    match len {
        0..=15 => 0.3,
        16..=30 => 0.7,
        31..=400 => 1.0,
        401..=800 => 0.7,
        _ => 0.4,
    }
}

/// Weighted combination of position, structure, lexical density, and
/// length, clipped to `[0, 1]`.
fn compute_salience(
    segment: &Segment,
    index: usize,
    total: usize,
    content_type: ContentType,
    cfg: &ExtractionConfig,
) -> f32 {
    let pos = position_weight(index, total, content_type, cfg);
    let structural = structural_weight(segment, index, total);
    let density = lexical_density(&segment.text);
    let length = length_penalty(&segment.text);

    let score = 0.30 * pos + 0.25 * structural + 0.25 * density + 0.20 * length;
    score.clamp(0.0, 1.0)
}

/// Computes embeddings and salience for every parsed segment.
pub struct SegmentExtractor {
    embedder: Option<Arc<dyn Embedder>>,
    config: ExtractionConfig,
}

impl SegmentExtractor {
    pub fn new(embedder: Option<Arc<dyn Embedder>>, config: ExtractionConfig) -> Self {
        Self { embedder, config }
    }

    /// Parse, score, and (best-effort) embed `markdown`, returning an
    /// [`ExtractionResult`]. Never fails due to embedder unavailability —
    /// segments simply keep `embedding = None` and retrieval degrades to
    /// salience-only.
    pub async fn extract(
        &self,
        markdown: &str,
        doc_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let start = std::time::Instant::now();
        let content_type = detect_content_type(markdown);

        let parser_options = ParserOptions {
            include_code: self.config.include_code_blocks,
            include_list_items: self.config.include_list_items,
            ..ParserOptions::default()
        };
        let mut segments = parser::parse(markdown, doc_id, &parser_options)?;
        let total = segments.len();

        for (i, segment) in segments.iter_mut().enumerate() {
            segment.salience = compute_salience(segment, i, total, content_type, &self.config);
            if i > 0 && i % self.config.cooperative_yield_threshold == 0 {
                tokio::task::yield_now().await;
            }
        }

        if let Some(embedder) = &self.embedder {
            self.embed_segments(&mut segments, embedder.as_ref(), cancel).await;
        } else {
            tracing::warn!("no embedder configured; extraction proceeds with embedding = None");
        }

        let mut ranked: Vec<usize> = (0..segments.len()).collect();
        ranked.sort_by(|&a, &b| {
            segments[b]
                .salience
                .partial_cmp(&segments[a].salience)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let target = ((self.config.extraction_ratio * total as f32).ceil() as usize)
            .max(self.config.min_segments)
            .min(self.config.max_segments)
            .min(total);
        ranked.truncate(target);

        Ok(ExtractionResult::new(
            segments,
            ranked,
            content_type,
            start.elapsed(),
        ))
    }

    async fn embed_segments(
        &self,
        segments: &mut [Segment],
        embedder: &dyn Embedder,
        cancel: &CancellationToken,
    ) {
        let batch_size = self.config.embed_batch_size.max(1);
        let indices: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.text.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        for chunk in indices.chunks(batch_size) {
            if cancel.is_cancelled() {
                tracing::warn!("embedding cancelled mid-batch; remaining segments keep embedding = None");
                return;
            }
            let texts: Vec<String> = chunk.iter().map(|&i| segments[i].text.clone()).collect();
            match embedder.embed_batch(&texts, cancel).await {
                Ok(vectors) => {
                    for (&idx, vector) in chunk.iter().zip(vectors) {
                        segments[idx].embedding = Some(vector);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "embedding batch failed; segments keep embedding = None");
                }
            }
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extraction_succeeds_without_embedder() {
        let extractor = SegmentExtractor::new(None, ExtractionConfig::default());
        let md = "# Title\n\nA short paragraph about widgets. Another sentence about widgets.\n";
        let result = extractor.extract(md, "doc1", &CancellationToken::new()).await.unwrap();
        assert!(result.total_segments() >= 2);
        assert!(result.all_segments.iter().all(|s| s.embedding.is_none()));
    }

    #[tokio::test]
    async fn all_salience_scores_are_in_unit_range() {
        let extractor = SegmentExtractor::new(None, ExtractionConfig::default());
        let md = "# T\n\nFirst sentence about something here. Second sentence about something else.\n## S2\n\nMore sentences follow in this section clearly.\n";
        let result = extractor.extract(md, "doc1", &CancellationToken::new()).await.unwrap();
        for seg in &result.all_segments {
            assert!(seg.salience >= 0.0 && seg.salience <= 1.0);
        }
    }

    #[tokio::test]
    async fn top_by_salience_never_exceeds_total() {
        let extractor = SegmentExtractor::new(
            None,
            ExtractionConfig {
                min_segments: 1,
                max_segments: 1,
                ..ExtractionConfig::default()
            },
        );
        let md = "# T\n\nFirst sentence here is long enough. Second sentence here is long enough too.\n";
        let result = extractor.extract(md, "doc1", &CancellationToken::new()).await.unwrap();
        assert!(result.top_by_salience_count() <= result.total_segments());
    }

    #[test]
    fn content_type_detection_prefers_narrative_keywords() {
        let text = "She said it was a long journey. He replied that chapter one was over.";
        assert_eq!(detect_content_type(text), ContentType::Narrative);
    }

    #[test]
    fn content_type_detection_prefers_expository_keywords() {
        let text = "The following algorithm returns a parameter defined as a configuration value. In conclusion, the specification holds. Table 1 shows the figure.";
        assert_eq!(detect_content_type(text), ContentType::Expository);
    }
}

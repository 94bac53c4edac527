//! [`Synthesizer`]: composes the final prose summary from retrieved
//! segments, calling an external [`Generator`] and never introducing facts
//! absent from the evidence it was given.
//!
//! No direct teacher analogue exists (the teacher never calls a remote
//! generation model); grounded on `search/hyde.rs` for template-driven,
//! content-type-aware prompt construction style and on
//! `llmspell-providers::abstraction::ProviderInstance` for the external
//! [`Generator`] trait shape.

pub mod cleaning;
pub mod entities;
pub mod generator;
pub mod prompt;

pub use generator::{Generator, GeneratorError, StaticGenerator};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::retrieval::Retrieved;
use crate::segment::ContentType;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

/// Output style recognized by the synthesizer; affects bullet count and
/// coverage-metadata rendering, not the underlying retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStyle {
    Prose,
    Bullets,
    Structured,
}

/// A named preset controlling target length, style, and prompt
/// customization. Presets: default, bookreport, executive, brief,
/// oneliner, strict, technical, academic, meeting, bullets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTemplate {
    pub name: String,
    pub target_words: u32,
    pub output_style: OutputStyle,
    pub max_bullets: u32,
    pub include_coverage_metadata: bool,
    pub executive_prompt_template: Option<String>,
}

impl SummaryTemplate {
    pub fn default_preset() -> Self {
        Self {
            name: "default".to_string(),
            target_words: 200,
            output_style: OutputStyle::Prose,
            max_bullets: 8,
            include_coverage_metadata: false,
            executive_prompt_template: None,
        }
    }

    pub fn brief() -> Self {
        Self {
            name: "brief".to_string(),
            target_words: 80,
            ..Self::default_preset()
        }
    }

    pub fn oneliner() -> Self {
        Self {
            name: "oneliner".to_string(),
            target_words: 25,
            ..Self::default_preset()
        }
    }

    pub fn executive() -> Self {
        Self {
            name: "executive".to_string(),
            target_words: 150,
            include_coverage_metadata: true,
            ..Self::default_preset()
        }
    }

    pub fn bookreport() -> Self {
        Self {
            name: "bookreport".to_string(),
            target_words: 400,
            ..Self::default_preset()
        }
    }

    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            include_coverage_metadata: true,
            ..Self::default_preset()
        }
    }

    pub fn technical() -> Self {
        Self {
            name: "technical".to_string(),
            output_style: OutputStyle::Structured,
            ..Self::default_preset()
        }
    }

    pub fn academic() -> Self {
        Self {
            name: "academic".to_string(),
            target_words: 300,
            include_coverage_metadata: true,
            ..Self::default_preset()
        }
    }

    pub fn meeting() -> Self {
        Self {
            name: "meeting".to_string(),
            output_style: OutputStyle::Bullets,
            max_bullets: 10,
            ..Self::default_preset()
        }
    }

    pub fn bullets() -> Self {
        Self {
            name: "bullets".to_string(),
            output_style: OutputStyle::Bullets,
            ..Self::default_preset()
        }
    }

    /// Resolve one of the ten built-in presets by name, `None` for anything
    /// else (the caller falls back to [`SummaryTemplate::default_preset`]).
    pub fn by_name(name: &str) -> Option<Self> {
        Some(match name {
            "default" => Self::default_preset(),
            "brief" => Self::brief(),
            "oneliner" => Self::oneliner(),
            "executive" => Self::executive(),
            "bookreport" => Self::bookreport(),
            "strict" => Self::strict(),
            "technical" => Self::technical(),
            "academic" => Self::academic(),
            "meeting" => Self::meeting(),
            "bullets" => Self::bullets(),
            _ => return None,
        })
    }
}

/// A short annotation plus citation-bearing excerpt for one section group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub section_title: String,
    pub annotation: String,
    pub excerpt: String,
    pub citations: Vec<String>,
}

/// Named-entity groups extracted from narrative content; empty for
/// expository/code-heavy content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entities {
    pub characters: Vec<String>,
    pub locations: Vec<String>,
    pub dates: Vec<String>,
    pub events: Vec<String>,
    pub organizations: Vec<String>,
}

/// Execution trace attached to every [`DocumentSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub document_id: String,
    pub total_segments: usize,
    pub retrieved_count: usize,
    pub headings: Vec<String>,
    pub elapsed_ms: u128,
    pub coverage_score: f32,
    pub citation_rate: f32,
}

/// The final produced value: a grounded, citation-bearing document
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub executive_summary: String,
    pub topic_summaries: Vec<TopicSummary>,
    pub open_questions: Vec<String>,
    pub trace: Trace,
    pub entities: Entities,
}

/// Minimum number of retrieved segments required to run the fact-sanity
/// pass, alongside `content_type == Narrative` and generator availability.
const FACT_SANITY_MIN_SEGMENTS: usize = 5;
/// Minimum evidence count prompt assembly tries to reach before admitting
/// code segments.
const MIN_EVIDENCE_COUNT: usize = 8;
/// Acceptable length ratio band for an accepted fact-sanity correction.
const FACT_SANITY_BAND: (f32, f32) = (0.5, 1.5);

pub struct Synthesizer<'a> {
    generator: Option<&'a dyn Generator>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(generator: Option<&'a dyn Generator>) -> Self {
        Self { generator }
    }

    /// Compose a [`DocumentSummary`] from `retrieved` segments.
    ///
    /// Pure function of its inputs: no cyclic reference back to the
    /// orchestrator, no hidden state beyond the generator handle.
    pub async fn synthesize(
        &self,
        doc_id: &str,
        title: &str,
        retrieved: &[Retrieved],
        total_segments: usize,
        content_type: ContentType,
        template: &SummaryTemplate,
        cancel: &CancellationToken,
    ) -> Result<DocumentSummary> {
        let start = std::time::Instant::now();

        if retrieved.is_empty() {
            return Ok(empty_summary(doc_id, total_segments, start.elapsed()));
        }

        let assembly = prompt::assemble(retrieved, title, template, MIN_EVIDENCE_COUNT);
        let coverage = retrieved.len() as f32 / total_segments.max(1) as f32;

        let generator_available = match self.generator {
            Some(g) => g.is_available().await,
            None => false,
        };

        let (executive_summary, citation_rate) = if generator_available {
            let generator = self.generator.unwrap();
            match generator
                .generate(&assembly.prompt, 0.3, cancel)
                .await
            {
                Ok(raw) => {
                    let cleaned = cleaning::clean(&raw, coverage);
                    if cleaned.trim().is_empty() {
                        extractive_fallback(retrieved)
                    } else {
                        let sanity_checked = if content_type == ContentType::Narrative
                            && retrieved.len() >= FACT_SANITY_MIN_SEGMENTS
                        {
                            self.fact_sanity_pass(generator, &cleaned, retrieved, cancel).await
                        } else {
                            cleaned
                        };
                        let final_text = cleaning::strip_preamble(&sanity_checked);
                        let rate = citation_rate_of(&final_text, retrieved);
                        (append_footer(&final_text, template, coverage), rate)
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "generator call failed; falling back to extractive summary");
                    extractive_fallback(retrieved)
                }
            }
        } else {
            tracing::info!("generator unavailable; using extractive fallback");
            extractive_fallback(retrieved)
        };

        let topic_summaries = prompt::group_topic_summaries(retrieved);
        let entities = if content_type == ContentType::Narrative {
            entities::extract(retrieved)
        } else {
            Entities::default()
        };

        let mut headings: Vec<String> = Vec::new();
        for r in retrieved {
            let Some(title) = &r.segment.section_title else { continue };
            if headings.len() >= 10 {
                break;
            }
            if !headings.contains(title) {
                headings.push(title.clone());
            }
        }

        Ok(DocumentSummary {
            executive_summary,
            topic_summaries,
            open_questions: Vec::new(),
            trace: Trace {
                document_id: doc_id.to_string(),
                total_segments,
                retrieved_count: retrieved.len(),
                headings,
                elapsed_ms: start.elapsed().as_millis(),
                coverage_score: coverage,
                citation_rate,
            },
            entities,
        })
    }

    async fn fact_sanity_pass(
        &self,
        generator: &dyn Generator,
        summary: &str,
        retrieved: &[Retrieved],
        cancel: &CancellationToken,
    ) -> String {
        let earliest: Vec<&Retrieved> = retrieved.iter().take(FACT_SANITY_MIN_SEGMENTS).collect();
        let facts_prompt = prompt::fact_extraction_prompt(&earliest);

        let facts = match generator.generate(&facts_prompt, 0.0, cancel).await {
            Ok(f) => f,
            Err(_) => return summary.to_string(),
        };

        let correction_prompt = prompt::fact_correction_prompt(summary, &facts);
        let corrected = match generator.generate(&correction_prompt, 0.0, cancel).await {
            Ok(c) => c,
            Err(_) => return summary.to_string(),
        };

        let corrected = cleaning::strip_preamble(&corrected);
        let ratio = corrected.len() as f32 / summary.len().max(1) as f32;
        if ratio >= FACT_SANITY_BAND.0 && ratio <= FACT_SANITY_BAND.1 {
            corrected
        } else {
            tracing::debug!(ratio, "fact-sanity correction rejected: outside acceptance band");
            summary.to_string()
        }
    }
}

fn extractive_fallback(retrieved: &[Retrieved]) -> (String, f32) {
    let mut lines = Vec::with_capacity(retrieved.len());
    for r in retrieved {
        lines.push(format!("- {} [{}]", r.segment.text.trim(), r.segment.citation_label()));
    }
    (lines.join("\n"), 1.0)
}

fn citation_rate_of(text: &str, retrieved: &[Retrieved]) -> f32 {
    if retrieved.is_empty() {
        return 0.0;
    }
    let cited = retrieved.iter().filter(|r| text.contains(r.segment.citation_label())).count();
    cited as f32 / retrieved.len() as f32
}

fn append_footer(text: &str, template: &SummaryTemplate, coverage: f32) -> String {
    if !template.include_coverage_metadata {
        return text.to_string();
    }
    let band = if coverage < 0.05 {
        "Low"
    } else if coverage < 0.15 {
        "Medium"
    } else {
        "High"
    };
    format!("{text}\n\n_Coverage: {:.1}% ({band} confidence)_", coverage * 100.0)
}

fn empty_summary(doc_id: &str, total_segments: usize, elapsed: Duration) -> DocumentSummary {
    DocumentSummary {
        executive_summary: "No content was available to summarize.".to_string(),
        topic_summaries: Vec::new(),
        open_questions: Vec::new(),
        trace: Trace {
            document_id: doc_id.to_string(),
            total_segments,
            retrieved_count: 0,
            headings: Vec::new(),
            elapsed_ms: elapsed.as_millis(),
            coverage_score: 0.0,
            citation_rate: 0.0,
        },
        entities: Entities::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segment, SegmentType};

    fn retrieved(text: &str, idx: usize) -> Retrieved {
        Retrieved {
            segment: Segment::new("d", idx, 0, text.len(), SegmentType::Paragraph, 0, None, text),
            query_similarity: None,
            retrieval_score: Some(0.5),
        }
    }

    #[tokio::test]
    async fn generator_unavailable_yields_extractive_fallback_with_full_citation_rate() {
        let generator = StaticGenerator::unavailable();
        let synth = Synthesizer::new(Some(&generator));
        let retrieved = vec![retrieved("Widgets are useful tools.", 0)];
        let summary = synth
            .synthesize(
                "doc1",
                "Title",
                &retrieved,
                1,
                ContentType::Expository,
                &SummaryTemplate::default_preset(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.trace.citation_rate, 1.0);
        assert!(summary.executive_summary.contains("Widgets"));
    }

    #[tokio::test]
    async fn empty_retrieved_set_yields_zero_coverage() {
        let synth = Synthesizer::new(None);
        let summary = synth
            .synthesize(
                "doc1",
                "Title",
                &[],
                0,
                ContentType::Unknown,
                &SummaryTemplate::default_preset(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.trace.coverage_score, 0.0);
    }
}

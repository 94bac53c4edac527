//! The [`Segment`] data model and the values that sit alongside it:
//! [`ContentType`], [`ExtractionResult`].

use serde::{Deserialize, Serialize};

use crate::hash::content_hash;

/// The kind of markdown construct a [`Segment`] was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Heading,
    Paragraph,
    ListItem,
    CodeBlock,
    Quote,
}

/// Lightweight document-level content classification, decided once per
/// document from a head sample. Tunes salience position weighting and gates
/// entity extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Narrative,
    Expository,
    #[default]
    Unknown,
}

/// The atomic unit of evidence: a heading, sentence, list item, code block,
/// or quote line, carrying its own embedding and salience score.
///
/// `id` is `{doc_id}_{index}_{content_hash[:n]}`; `embedding`, when present,
/// is L2-normalized; `content_hash` is deterministic over canonicalized
/// text (see [`crate::hash::canonicalize`]); `index` is strictly increasing
/// and matches source order.
///
/// `query_similarity` and `retrieval_score` are transient, retrieval-pass
/// scoped fields. They are not persisted by [`crate::store::VectorStore`]
/// and are not part of the value's identity or hash.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub doc_id: String,
    pub index: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    pub segment_type: SegmentType,
    pub heading_level: u8,
    pub section_title: Option<String>,
    pub text: String,
    pub content_hash: String,
    pub embedding: Option<Vec<f32>>,
    pub salience: f32,
    #[serde(skip)]
    pub query_similarity: Option<f32>,
    #[serde(skip)]
    pub retrieval_score: Option<f32>,
}

/// Number of hex characters of `content_hash` folded into [`Segment::id`].
const ID_HASH_PREFIX_LEN: usize = 12;

impl Segment {
    /// Construct a new segment, deriving `id` and `content_hash` from
    /// `doc_id`, `index`, and `text`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        doc_id: impl Into<String>,
        index: usize,
        byte_start: usize,
        byte_end: usize,
        segment_type: SegmentType,
        heading_level: u8,
        section_title: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        let doc_id = doc_id.into();
        let text = text.into();
        let hash = content_hash(&text);
        let prefix: String = hash.chars().take(ID_HASH_PREFIX_LEN).collect();
        let id = format!("{doc_id}_{index}_{prefix}");
        Self {
            id,
            doc_id,
            index,
            byte_start,
            byte_end,
            segment_type,
            heading_level,
            section_title,
            text,
            content_hash: hash,
            embedding: None,
            salience: 0.0,
            query_similarity: None,
            retrieval_score: None,
        }
    }

    /// The id, used verbatim as a citation marker in synthesized prose.
    pub fn citation_label(&self) -> &str {
        &self.id
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// The output of [`crate::extraction::SegmentExtractor::extract`].
///
/// `top_by_salience` is a view (indices into `all_segments`), not a copy of
/// owned segments, so `top_by_salience.len() <= all_segments.len()` always
/// holds and no segment is duplicated in memory.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub all_segments: Vec<Segment>,
    /// Indices into `all_segments`, sorted by salience descending.
    top_by_salience_idx: Vec<usize>,
    pub content_type: ContentType,
    pub extraction_time: std::time::Duration,
}

impl ExtractionResult {
    pub fn new(
        all_segments: Vec<Segment>,
        top_by_salience_idx: Vec<usize>,
        content_type: ContentType,
        extraction_time: std::time::Duration,
    ) -> Self {
        debug_assert!(top_by_salience_idx.len() <= all_segments.len());
        Self {
            all_segments,
            top_by_salience_idx,
            content_type,
            extraction_time,
        }
    }

    /// The top-by-salience view, resolved to segment references in
    /// descending-salience order.
    pub fn top_by_salience(&self) -> impl Iterator<Item = &Segment> {
        self.top_by_salience_idx.iter().map(move |&i| &self.all_segments[i])
    }

    pub fn top_by_salience_count(&self) -> usize {
        self.top_by_salience_idx.len()
    }

    pub fn total_segments(&self) -> usize {
        self.all_segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format_matches_spec() {
        let seg = Segment::new(
            "doc1",
            3,
            0,
            10,
            SegmentType::Paragraph,
            0,
            None,
            "hello world",
        );
        let prefix: String = seg.content_hash.chars().take(ID_HASH_PREFIX_LEN).collect();
        assert_eq!(seg.id, format!("doc1_3_{prefix}"));
    }

    #[test]
    fn index_is_recorded_verbatim() {
        let seg = Segment::new("d", 7, 0, 1, SegmentType::Heading, 1, None, "Title");
        assert_eq!(seg.index, 7);
    }

    #[test]
    fn extraction_result_view_never_exceeds_total() {
        let segs = vec![
            Segment::new("d", 0, 0, 1, SegmentType::Paragraph, 0, None, "a"),
            Segment::new("d", 1, 0, 1, SegmentType::Paragraph, 0, None, "b"),
        ];
        let result = ExtractionResult::new(
            segs,
            vec![1, 0],
            ContentType::Expository,
            std::time::Duration::from_millis(1),
        );
        assert!(result.top_by_salience_count() <= result.total_segments());
    }
}

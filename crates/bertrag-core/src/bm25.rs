//! Classical Okapi BM25 over the segment corpus of a single document.
//!
//! Full corpus-level indexing: per-term document frequency, per-document
//! term frequency, and average document length are all computed once over
//! the whole segment set rather than scoring one candidate at a time against
//! a fixed average-length constant.

use std::collections::HashMap;

use crate::segment::Segment;

/// `k1` term-frequency saturation parameter.
pub const K1: f32 = 1.5;
/// `b` length-normalization parameter.
pub const B: f32 = 0.75;
/// Minimum token length kept after tokenization.
const MIN_TOKEN_LEN: usize = 2;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "of", "to", "in", "on", "for",
    "with", "as", "at", "by", "from", "is", "are", "was", "were", "be", "been", "being", "this",
    "that", "these", "those", "it", "its", "it's", "into", "about", "than", "so", "such", "not",
    "no", "do", "does", "did", "has", "have", "had", "can", "could", "will", "would", "should",
    "may", "might", "must", "i", "you", "he", "she", "we", "they", "them", "his", "her", "their",
    "our", "your", "my",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// A corpus-level BM25 index over a fixed segment set. Built once per
/// extraction run; immutable after construction, with build and score
/// deliberately kept as separate steps.
pub struct Bm25Index {
    /// Per-term document frequency (number of segments containing the term).
    document_frequency: HashMap<String, usize>,
    /// Per-segment term frequencies, aligned by position with the segments
    /// passed to [`Bm25Index::build`].
    term_frequencies: Vec<HashMap<String, usize>>,
    document_lengths: Vec<usize>,
    average_document_length: f32,
    num_documents: usize,
    k1: f32,
    b: f32,
}

impl Bm25Index {
    /// Build an index over `segments` using the default `k1`/`b`.
    pub fn build(segments: &[Segment]) -> Self {
        Self::build_with_params(segments, K1, B)
    }

    pub fn build_with_params(segments: &[Segment], k1: f32, b: f32) -> Self {
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut term_frequencies = Vec::with_capacity(segments.len());
        let mut document_lengths = Vec::with_capacity(segments.len());

        for segment in segments {
            let tokens = tokenize(&segment.text);
            document_lengths.push(tokens.len());

            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            term_frequencies.push(tf);
        }

        let num_documents = segments.len();
        let average_document_length = if num_documents == 0 {
            0.0
        } else {
            document_lengths.iter().sum::<usize>() as f32 / num_documents as f32
        };

        Self {
            document_frequency,
            term_frequencies,
            document_lengths,
            average_document_length,
            num_documents,
            k1,
            b,
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let df = *self.document_frequency.get(term).unwrap_or(&0) as f32;
        let n = self.num_documents as f32;
        // Standard Robertson-Sparck-Jones IDF with +1 smoothing, clamped to
        // non-negative so a term present in every document scores 0, not
        // negative.
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln().max(0.0)
    }

    /// Score `query` against every segment, returning a dense list aligned
    /// with the segments passed to [`Bm25Index::build`].
    pub fn score(&self, query: &str) -> Vec<f32> {
        let query_terms = tokenize(query);
        let mut scores = vec![0.0f32; self.num_documents];
        if query_terms.is_empty() || self.num_documents == 0 {
            return scores;
        }

        for (doc_idx, tf) in self.term_frequencies.iter().enumerate() {
            let doc_len = self.document_lengths[doc_idx] as f32;
            let mut score = 0.0f32;
            for term in &query_terms {
                let Some(&freq) = tf.get(term) else { continue };
                let freq = freq as f32;
                let idf = self.idf(term);
                let denom = freq
                    + self.k1 * (1.0 - self.b + self.b * doc_len / self.average_document_length.max(1e-6));
                score += idf * (freq * (self.k1 + 1.0)) / denom;
            }
            scores[doc_idx] = score;
        }
        scores
    }

    pub fn average_document_length(&self) -> f32 {
        self.average_document_length
    }

    pub fn len(&self) -> usize {
        self.num_documents
    }

    pub fn is_empty(&self) -> bool {
        self.num_documents == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentType;

    fn seg(doc: &str, idx: usize, text: &str) -> Segment {
        Segment::new(doc, idx, 0, text.len(), SegmentType::Paragraph, 0, None, text)
    }

    #[test]
    fn scores_aligned_with_segment_count() {
        let segs = vec![
            seg("d", 0, "widgets are useful industrial components for factories"),
            seg("d", 1, "gadgets are a different kind of small consumer device"),
        ];
        let index = Bm25Index::build(&segs);
        let scores = index.score("widgets");
        assert_eq!(scores.len(), segs.len());
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn empty_query_yields_zero_scores() {
        let segs = vec![seg("d", 0, "widgets are useful industrial components")];
        let index = Bm25Index::build(&segs);
        let scores = index.score("");
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn term_absent_from_corpus_scores_zero_everywhere() {
        let segs = vec![
            seg("d", 0, "widgets are useful industrial components"),
            seg("d", 1, "gadgets are a different kind of device"),
        ];
        let index = Bm25Index::build(&segs);
        let scores = index.score("xyzzy");
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn higher_term_frequency_scores_higher() {
        let segs = vec![
            seg("d", 0, "widgets widgets widgets widgets are the focus here"),
            seg("d", 1, "widgets appear once in this much longer passage about factories and distribution"),
        ];
        let index = Bm25Index::build(&segs);
        let scores = index.score("widgets");
        assert!(scores[0] > scores[1]);
    }
}

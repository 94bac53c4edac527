//! Heuristic named-entity extraction for narrative content.
//!
//! No NER crate is used — grounded on the teacher's own preference for
//! heuristic `str`-based classification in `search/hyde.rs`'s query-intent
//! classifier. Proper-noun spans are detected by capitalization with
//! honorific and place-suffix continuation, then bucketed by keyword
//! context and filtered against stopword/boilerplate sets.

use std::collections::HashMap;

use crate::retrieval::Retrieved;

use super::Entities;

const HONORIFICS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Miss", "Dr", "Prof", "Captain", "Inspector", "Professor", "Sir", "Lady",
    "Lord", "General", "Colonel", "Major", "Sergeant", "Father", "Mother", "Aunt", "Uncle",
    "Detective", "Reverend",
];

const PLACE_SUFFIXES: &[&str] = &[
    "Street", "Road", "Avenue", "Lane", "Square", "Boulevard", "Court", "Place", "Drive",
    "River", "Mountain", "Island", "Bay", "Park",
];

const ORG_SUFFIXES: &[&str] = &["Inc", "Co", "Corporation", "Company", "Ltd", "University", "Association", "Society"];

const EVENT_KEYWORDS: &[&str] = &["war", "battle", "ceremony", "festival", "wedding", "funeral", "trial", "expedition"];

const STOPWORDS: &[&str] = &[
    "I", "He", "She", "They", "We", "You", "It", "The", "This", "That", "These", "Those", "His",
    "Her", "Their", "Our", "Your", "My", "However", "Therefore", "Meanwhile", "Suddenly",
    "Nevertheless", "Moreover", "Indeed", "Perhaps", "Afterward", "Afterwards",
];

const CALENDAR_NAMES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday",
];

const PROGRAMMING_KEYWORDS: &[&str] = &[
    "Fn", "Let", "Struct", "Impl", "Class", "Function", "Return", "Const", "Static", "Async",
];

const GUTENBERG_BOILERPLATE: &[&str] = &["Project", "Gutenberg", "Ebook", "License"];

fn is_rejected(word: &str) -> bool {
    STOPWORDS.contains(&word)
        || CALENDAR_NAMES.contains(&word)
        || PROGRAMMING_KEYWORDS.contains(&word)
        || GUTENBERG_BOILERPLATE.contains(&word)
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
        && word.chars().skip(1).all(|c| c.is_lowercase() || !c.is_alphabetic())
}

#[derive(Default)]
struct SpanCounts {
    counts: HashMap<String, usize>,
    has_honorific: HashMap<String, bool>,
}

/// Extract entities from the text of `retrieved` segments.
pub fn extract(retrieved: &[Retrieved]) -> Entities {
    let mut characters = SpanCounts::default();
    let mut locations = SpanCounts::default();
    let mut organizations = SpanCounts::default();
    let mut events = SpanCounts::default();
    let mut dates: Vec<String> = Vec::new();

    for r in retrieved {
        scan_text(&r.segment.text, &mut characters, &mut locations, &mut organizations, &mut events, &mut dates);
    }

    Entities {
        characters: finalize(characters),
        locations: finalize(locations),
        organizations: finalize(organizations),
        events: finalize(events),
        dates: {
            let mut d = dates;
            d.sort();
            d.dedup();
            d
        },
    }
}

fn scan_text(
    text: &str,
    characters: &mut SpanCounts,
    locations: &mut SpanCounts,
    organizations: &mut SpanCounts,
    events: &mut SpanCounts,
    dates: &mut Vec<String>,
) {
    let words: Vec<&str> = text.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric())).collect();

    let mut i = 0;
    while i < words.len() {
        let word = words[i];
        if word.is_empty() {
            i += 1;
            continue;
        }

        if CALENDAR_NAMES.contains(&word) {
            let mut span = vec![word];
            let mut j = i + 1;
            while j < words.len() && (words[j].chars().all(|c| c.is_ascii_digit()) || words[j] == ",") {
                span.push(words[j]);
                j += 1;
            }
            dates.push(span.join(" "));
            i = j;
            continue;
        }

        if HONORIFICS.contains(&word) {
            let mut span_words = vec![word];
            let mut j = i + 1;
            while j < words.len() && is_capitalized(words[j]) && !is_rejected(words[j]) {
                span_words.push(words[j]);
                j += 1;
            }
            if span_words.len() > 1 {
                let key = span_words.join(" ");
                *characters.counts.entry(key.clone()).or_insert(0) += 1;
                characters.has_honorific.insert(key, true);
            }
            i = j;
            continue;
        }

        if is_capitalized(word) && !is_rejected(word) {
            let mut span_words = vec![word];
            let mut j = i + 1;
            while j < words.len() && is_capitalized(words[j]) && !is_rejected(words[j]) {
                span_words.push(words[j]);
                j += 1;
            }

            let trailing = span_words.last().copied().unwrap_or("");
            if PLACE_SUFFIXES.contains(&trailing) {
                let key = span_words.join(" ");
                *locations.counts.entry(key).or_insert(0) += 1;
            } else if ORG_SUFFIXES.contains(&trailing) {
                let key = span_words.join(" ");
                *organizations.counts.entry(key).or_insert(0) += 1;
            } else if EVENT_KEYWORDS.iter().any(|k| trailing.eq_ignore_ascii_case(k)) {
                let key = span_words.join(" ");
                *events.counts.entry(key).or_insert(0) += 1;
            } else {
                let key = span_words.join(" ");
                *characters.counts.entry(key).or_insert(0) += 1;
            }
            i = j;
            continue;
        }

        i += 1;
    }
}

/// Single-word names require frequency >= 2; multi-word names carrying an
/// honorific pass with >= 1 occurrence.
fn finalize(spans: SpanCounts) -> Vec<String> {
    let mut out: Vec<String> = spans
        .counts
        .into_iter()
        .filter(|(key, count)| {
            let is_multi_word = key.contains(' ');
            let has_honorific = spans.has_honorific.get(key).copied().unwrap_or(false);
            if has_honorific || (is_multi_word && *count >= 1) {
                true
            } else {
                *count >= 2
            }
        })
        .map(|(key, _)| key)
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segment, SegmentType};

    fn retrieved(text: &str) -> Retrieved {
        Retrieved {
            segment: Segment::new("d", 0, 0, text.len(), SegmentType::Paragraph, 0, None, text),
            query_similarity: None,
            retrieval_score: None,
        }
    }

    #[test]
    fn honorific_name_passes_with_single_occurrence() {
        let r = vec![retrieved("Dr. Watson examined the body carefully.")];
        let entities = extract(&r);
        assert!(entities.characters.iter().any(|c| c.contains("Watson")));
    }

    #[test]
    fn single_word_name_requires_two_occurrences() {
        let r = vec![retrieved("Mary walked into the room. Mary smiled warmly.")];
        let entities = extract(&r);
        assert!(entities.characters.iter().any(|c| c == "Mary"));
    }

    #[test]
    fn pronouns_are_rejected() {
        let r = vec![retrieved("She said hello. She waved again happily.")];
        let entities = extract(&r);
        assert!(!entities.characters.iter().any(|c| c == "She"));
    }

    #[test]
    fn place_suffix_classifies_as_location() {
        let r = vec![retrieved("They walked down Baker Street together quietly.")];
        let entities = extract(&r);
        assert!(entities.locations.iter().any(|l| l.contains("Street")));
    }
}

//! Sentence-boundary detection for paragraph splitting.
//!
//! A boundary is `.`, `!`, or `?` followed by whitespace and then a capital
//! letter or an opening quote, with a trailing-abbreviation exception so
//! `Dr. Watson` does not split after `Dr.`.

/// Abbreviations that never end a sentence even when followed by
/// whitespace + capital.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "i.e", "e.g", "cf", "fig",
    "vol", "no", "col", "gen", "capt", "lt", "sgt", "rev", "hon", "esq", "inc", "ltd", "co",
];

/// Minimum character length for a kept sentence, per the parser's sentence
/// granularity rule.
pub const MIN_SENTENCE_LENGTH: usize = 10;

fn ends_with_abbreviation(before: &str) -> bool {
    let trimmed = before.trim_end_matches(['.', '!', '?']);
    let last_word = trimmed
        .rsplit(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .next()
        .unwrap_or("");
    let lower = last_word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Split `text` into sentences, dropping any sentence shorter than
/// [`MIN_SENTENCE_LENGTH`] characters after trimming.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    let mut i = 0;
    while i < chars.len() {
        let (byte_idx, ch) = chars[i];
        if matches!(ch, '.' | '!' | '?') {
            // Find the end of this run of terminal punctuation (e.g. "...", "?!").
            let mut j = i;
            while j + 1 < chars.len() && matches!(chars[j + 1].1, '.' | '!' | '?') {
                j += 1;
            }
            let after_idx = if j + 1 < chars.len() {
                chars[j + 1].0
            } else {
                bytes.len()
            };
            let rest = &text[after_idx..];
            let next_non_ws = rest.trim_start();
            let followed_by_ws = rest.len() != next_non_ws.len() || rest.is_empty();
            let next_starts_boundary = next_non_ws
                .chars()
                .next()
                .map(|c| c.is_uppercase() || c == '"' || c == '\u{201c}' || c == '\'')
                .unwrap_or(true);

            if followed_by_ws && next_starts_boundary {
                let candidate_end = if j + 1 < chars.len() {
                    chars[j + 1].0
                } else {
                    bytes.len()
                };
                let before = &text[start..byte_idx];
                if !ends_with_abbreviation(before) {
                    let sentence = text[start..candidate_end].trim();
                    if sentence.len() >= MIN_SENTENCE_LENGTH {
                        sentences.push(sentence);
                    }
                    start = candidate_end;
                }
            }
            i = j + 1;
            continue;
        }
        i += 1;
    }

    let tail = text[start..].trim();
    if tail.len() >= MIN_SENTENCE_LENGTH {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_simple_boundary() {
        let out = split_sentences("This is one sentence. This is another sentence.");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn respects_abbreviation_allow_list() {
        let out = split_sentences("Dr. Watson arrived at the scene quickly this morning.");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn drops_short_fragments() {
        let out = split_sentences("Ok. This is a long enough sentence to keep around.");
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("This"));
    }

    #[test]
    fn handles_question_and_exclamation() {
        let out = split_sentences("Who is there? Someone is knocking on the door loudly!");
        assert_eq!(out.len(), 2);
    }
}

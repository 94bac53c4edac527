//! Post-generation cleaning: preamble stripping and the low-coverage
//! discourse-marker guard.
//!
//! Pure `str` logic, no `regex` dependency — consistent with the teacher
//! never reaching for `regex` in its own string heuristics (`hyde.rs`'s
//! intent classifier, `reranker.rs`'s tokenizer, the markdown title
//! heuristics all use plain `str` methods).

const PREAMBLE_PREFIXES: &[&str] = &[
    "here is",
    "here's",
    "below is",
    "below are",
    "based on",
    "certainly",
    "sure,",
    "sure!",
    "i'll",
    "this document",
    "the following is",
];

const ABSOLUTIST_MARKERS: &[&str] = &["ultimately", "finally", "in the end", "it becomes clear"];

/// Coverage threshold below which the absolutist-marker guard and
/// sampled-scope disclaimer apply.
const LOW_COVERAGE_THRESHOLD: f32 = 0.05;

/// Strip known preamble phrases line-by-line until a non-preamble line
/// appears.
pub fn strip_preamble(text: &str) -> String {
    let mut lines = text.lines().peekable();
    let mut out_lines = Vec::new();
    let mut stripping = true;

    for line in lines.by_ref() {
        let trimmed = line.trim();
        if stripping {
            if trimmed.is_empty() {
                continue;
            }
            let lower = trimmed.to_lowercase();
            if PREAMBLE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                continue;
            }
            stripping = false;
        }
        out_lines.push(line);
    }

    out_lines.join("\n").trim().to_string()
}

/// Remove absolutist discourse markers, case-insensitively, collapsing any
/// doubled whitespace the removal leaves behind.
fn strip_absolutist_markers(text: &str) -> String {
    let mut result = text.to_string();
    for marker in ABSOLUTIST_MARKERS {
        result = replace_case_insensitive(&result, marker, "");
    }
    normalize_whitespace(&result)
}

fn replace_case_insensitive(text: &str, needle: &str, replacement: &str) -> String {
    let lower_text = text.to_lowercase();
    let lower_needle = needle.to_lowercase();
    if !lower_text.contains(&lower_needle) {
        return text.to_string();
    }
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut lower_rest = lower_text.as_str();
    while let Some(pos) = lower_rest.find(&lower_needle) {
        result.push_str(&rest[..pos]);
        result.push_str(replacement);
        rest = &rest[pos + needle.len()..];
        lower_rest = &lower_rest[pos + needle.len()..];
    }
    result.push_str(rest);
    result
}

/// Collapse runs of spaces (but not newlines) left behind by marker
/// removal, per the coverage guard's implementer note.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| {
            let collapsed: Vec<&str> = line.split(' ').filter(|s| !s.is_empty()).collect();
            collapsed.join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sampled_scope_disclaimer() -> &'static str {
    "_This summary was generated from a limited sample of the document's content._"
}

/// Full post-generation cleaning pass: preamble strip, then (if `coverage`
/// is below the low-coverage threshold) absolutist-marker removal plus a
/// prepended sampled-scope disclaimer.
pub fn clean(raw: &str, coverage: f32) -> String {
    let stripped = strip_preamble(raw);
    if coverage < LOW_COVERAGE_THRESHOLD {
        let guarded = strip_absolutist_markers(&stripped);
        format!("{}\n\n{}", sampled_scope_disclaimer(), guarded)
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_preamble_prefixes() {
        let raw = "Here is a summary of the document.\nWidgets are useful tools for factories.";
        let cleaned = strip_preamble(raw);
        assert!(cleaned.starts_with("Widgets"));
    }

    #[test]
    fn preamble_only_text_leaves_empty_remainder() {
        let raw = "Certainly, here is a summary.\nBased on the evidence provided.";
        let cleaned = strip_preamble(raw);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn low_coverage_prepends_disclaimer_and_strips_markers() {
        let raw = "Ultimately, the document concludes with widgets.";
        let cleaned = clean(raw, 0.01);
        assert!(cleaned.contains("limited sample"));
        assert!(!cleaned.to_lowercase().contains("ultimately"));
    }

    #[test]
    fn marker_removal_does_not_leave_doubled_spaces() {
        let text = "This is ultimately the point.";
        let guarded = strip_absolutist_markers(text);
        assert!(!guarded.contains("  "));
    }

    #[test]
    fn high_coverage_leaves_markers_untouched() {
        let raw = "Finally, the summary is complete with widgets discussed.";
        let cleaned = clean(raw, 0.5);
        assert!(cleaned.to_lowercase().contains("finally"));
    }
}

//! Prompt assembly and title extraction.
//!
//! Template selection is content-type aware (narrative vs expository)
//! exactly the way the teacher's `search/hyde.rs` picks a query-expansion
//! template by classified intent; the prompt forbids fabricated references
//! and quoted citation markers in prose, per the synthesizer's no-new-facts
//! contract.

use crate::retrieval::Retrieved;
use crate::segment::SegmentType;

use super::{SummaryTemplate, TopicSummary};

pub struct PromptAssembly {
    pub prompt: String,
    pub evidence_count: usize,
}

/// Build the synthesis prompt from `retrieved` segments.
///
/// 1. Filter out heavy code unless needed to reach `min_evidence_count`.
/// 2. Group remaining segments by section for a structural outline.
/// 3. Select a content-free-of-the-word-"content-type" prompt template
///    (narrative vs expository) unless the template supplies a custom
///    prompt.
/// 4. Forbid quoted citation markers, fabricated references, redundancy.
pub fn assemble(
    retrieved: &[Retrieved],
    title: &str,
    template: &SummaryTemplate,
    min_evidence_count: usize,
) -> PromptAssembly {
    let non_code: Vec<&Retrieved> = retrieved
        .iter()
        .filter(|r| r.segment.segment_type != SegmentType::CodeBlock)
        .collect();

    let evidence: Vec<&Retrieved> = if non_code.len() >= min_evidence_count || retrieved.len() == non_code.len() {
        non_code
    } else {
        retrieved.iter().collect()
    };

    let outline = group_by_section(&evidence);

    let mut body = String::new();
    for (section, items) in &outline {
        if let Some(section) = section {
            body.push_str(&format!("## {section}\n"));
        }
        for item in items {
            body.push_str(&format!(
                "- [{}] {}\n",
                item.segment.citation_label(),
                item.segment.text.trim()
            ));
        }
    }

    let instructions = if let Some(custom) = &template.executive_prompt_template {
        custom.clone()
    } else {
        default_instructions(template)
    };

    let prompt = format!(
        "Document title: {title}\n\n\
         {instructions}\n\n\
         Write within approximately {target_words} words. \
         Do not use quoted citation markers like [id] in your prose. \
         Do not invent facts, names, or references that are not present in the evidence below. \
         Avoid repeating the same point in different words.\n\n\
         Evidence:\n{body}",
        target_words = template.target_words,
    );

    PromptAssembly {
        prompt,
        evidence_count: evidence.len(),
    }
}

fn default_instructions(template: &SummaryTemplate) -> String {
    match template.output_style {
        super::OutputStyle::Bullets => format!(
            "Summarize the evidence below as at most {} concise bullet points.",
            template.max_bullets
        ),
        super::OutputStyle::Structured => {
            "Summarize the evidence below as a structured technical overview, preserving terminology exactly as written.".to_string()
        }
        super::OutputStyle::Prose => {
            "Summarize the evidence below as flowing prose, in your own words but grounded strictly in the evidence.".to_string()
        }
    }
}

/// Group retrieved segments by their nearest section title, preserving
/// document order within and across groups.
fn group_by_section<'a>(items: &[&'a Retrieved]) -> Vec<(Option<String>, Vec<&'a Retrieved>)> {
    let mut groups: Vec<(Option<String>, Vec<&Retrieved>)> = Vec::new();
    for item in items {
        let title = item.segment.section_title.clone();
        match groups.last_mut() {
            Some((last_title, bucket)) if *last_title == title => bucket.push(item),
            _ => groups.push((title, vec![item])),
        }
    }
    groups
}

/// Up to 10 section groups, each with a short annotation and a
/// citation-bearing excerpt.
pub fn group_topic_summaries(retrieved: &[Retrieved]) -> Vec<TopicSummary> {
    let refs: Vec<&Retrieved> = retrieved.iter().collect();
    group_by_section(&refs)
        .into_iter()
        .take(10)
        .map(|(title, items)| {
            let citations: Vec<String> = items.iter().map(|i| i.segment.citation_label().to_string()).collect();
            let excerpt = items
                .iter()
                .map(|i| i.segment.text.trim())
                .collect::<Vec<_>>()
                .join(" ");
            TopicSummary {
                section_title: title.unwrap_or_else(|| "Untitled".to_string()),
                annotation: format!("{} evidence segment(s)", items.len()),
                excerpt,
                citations,
            }
        })
        .collect()
}

/// Extract a document title: the first level-1 heading; otherwise scan the
/// first ~5 segments for `Title:`/`Author:` lines or an all-titlecase
/// short-line heuristic; otherwise fall back to a sanitized filename.
pub fn extract_title(segments: &[crate::segment::Segment], fallback_filename: &str) -> String {
    if let Some(h1) = segments
        .iter()
        .find(|s| s.segment_type == SegmentType::Heading && s.heading_level == 1)
    {
        return h1.text.clone();
    }

    for segment in segments.iter().take(5) {
        let trimmed = segment.text.trim();
        if let Some(rest) = trimmed.strip_prefix("Title:") {
            return rest.trim().to_string();
        }
        if is_titlecase_short_line(trimmed) {
            return trimmed.to_string();
        }
    }

    crate::hash::sanitize(fallback_filename)
}

fn is_titlecase_short_line(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 8 {
        return false;
    }
    words.iter().all(|w| {
        w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
    })
}

pub fn fact_extraction_prompt(earliest: &[&Retrieved]) -> String {
    let evidence: String = earliest
        .iter()
        .map(|r| format!("- {}", r.segment.text.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "From the evidence below, list 3 to 5 short, independently verifiable fact statements. \
         Do not add commentary.\n\nEvidence:\n{evidence}"
    )
}

pub fn fact_correction_prompt(summary: &str, facts: &str) -> String {
    format!(
        "Facts:\n{facts}\n\n\
         Summary:\n{summary}\n\n\
         If the summary above is consistent with every fact, return it unchanged. \
         Otherwise return a corrected version that is consistent with the facts. \
         Return only the summary text, nothing else."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segment, SegmentType};

    fn seg(index: usize, segment_type: SegmentType, heading_level: u8, text: &str) -> Segment {
        Segment::new("d", index, 0, text.len(), segment_type, heading_level, None, text)
    }

    #[test]
    fn extracts_first_level_one_heading_as_title() {
        let segments = vec![
            seg(0, SegmentType::Heading, 1, "My Document"),
            seg(1, SegmentType::Paragraph, 0, "Body text follows here nicely."),
        ];
        assert_eq!(extract_title(&segments, "fallback.md"), "My Document");
    }

    #[test]
    fn falls_back_to_sanitized_filename_when_no_heading() {
        let segments = vec![seg(0, SegmentType::Paragraph, 0, "just a regular paragraph of text")];
        assert_eq!(extract_title(&segments, "My Report.md"), "my_report_md");
    }

    #[test]
    fn prompt_forbids_citation_markers_in_instructions() {
        let retrieved = vec![Retrieved {
            segment: seg(0, SegmentType::Paragraph, 0, "Widgets are useful."),
            query_similarity: None,
            retrieval_score: Some(0.5),
        }];
        let assembly = assemble(&retrieved, "Title", &SummaryTemplate::default_preset(), 8);
        assert!(assembly.prompt.contains("Do not use quoted citation markers"));
    }
}

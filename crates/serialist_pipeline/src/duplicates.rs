//! Detection of plot events a draft is about to repeat.

use serde::{Deserialize, Serialize};
use serialist_story::PlotGraph;
use std::collections::BTreeSet;

/// Share of an event's significant words that must reappear in a paragraph.
pub const DUPLICATE_OVERLAP_THRESHOLD: f64 = 0.6;

/// Chapters back that count as recent.
pub const DUPLICATE_EVENT_WINDOW: u32 = 10;

/// Events with fewer significant words are too vague to match.
const MIN_EVENT_WORDS: usize = 3;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "against", "also", "because", "been", "before", "being", "between",
    "could", "does", "down", "during", "each", "even", "from", "further", "have", "having", "here",
    "into", "just", "like", "more", "most", "much", "once", "only", "other", "over", "same",
    "should", "some", "such", "than", "that", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "under", "until", "very", "were", "what", "when", "where", "which",
    "while", "will", "with", "would", "your",
];

/// A recent event the draft seems to narrate again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateWarning {
    /// Plot node id
    pub node_id: String,
    /// Node content
    pub event: String,
    /// Chapter the event was recorded in
    pub introduced_at: u32,
    /// Fraction of the event's significant words found in the paragraph
    pub overlap: f64,
}

impl DuplicateWarning {
    /// One line for the self-review prompt.
    pub fn render(&self) -> String {
        format!(
            "- Chapter {} already covered: \"{}\" ({:.0}% overlap)",
            self.introduced_at,
            self.event,
            self.overlap * 100.0
        )
    }
}

/// Lowercased words of four or more letters, minus common function words.
pub fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Recent active events whose significant words largely reappear in one
/// paragraph of `draft`. One warning per event, with its best overlap.
pub fn detect_duplicate_events(draft: &str, graph: &PlotGraph, chapter: u32) -> Vec<DuplicateWarning> {
    let paragraphs: Vec<BTreeSet<String>> = draft
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(significant_words)
        .filter(|words| !words.is_empty())
        .collect();

    graph
        .recent_events(chapter, DUPLICATE_EVENT_WINDOW)
        .into_iter()
        .filter_map(|node| {
            let event_words = significant_words(&node.content);
            if event_words.len() < MIN_EVENT_WORDS {
                return None;
            }
            let best = paragraphs
                .iter()
                .map(|para| event_words.intersection(para).count() as f64 / event_words.len() as f64)
                .fold(0.0_f64, f64::max);
            (best >= DUPLICATE_OVERLAP_THRESHOLD).then(|| DuplicateWarning {
                node_id: node.id.clone(),
                event: node.content.clone(),
                introduced_at: node.introduced_at,
                overlap: best,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_and_short_words_are_ignored() {
        let words = significant_words("They were at the Harbor, and THEY stole the ledger!");
        assert_eq!(
            words.into_iter().collect::<Vec<_>>(),
            vec!["harbor".to_string(), "ledger".to_string(), "stole".to_string()]
        );
    }
}

//! Quality check thresholds.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Thresholds for the rule-based checks.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct QualityConfig {
    /// Shortest acceptable chapter, in characters
    #[serde(default = "default_min_body_chars")]
    min_body_chars: usize,

    /// Longest acceptable chapter, in characters
    #[serde(default = "default_max_body_chars")]
    max_body_chars: usize,

    /// Fewest acceptable paragraphs
    #[serde(default = "default_min_paragraphs")]
    min_paragraphs: usize,

    /// Smallest acceptable share of characters inside dialogue marks
    #[serde(default = "default_min_dialogue_ratio")]
    min_dialogue_ratio: f64,

    /// Paragraph length above which a paragraph needs sensory detail or dialogue
    #[serde(default = "default_bland_paragraph_chars")]
    bland_paragraph_chars: usize,

    /// Paragraph length counted as long
    #[serde(default = "default_long_paragraph_chars")]
    long_paragraph_chars: usize,

    /// Long paragraphs at which the chapter is flagged
    #[serde(default = "default_max_long_paragraphs")]
    max_long_paragraphs: usize,

    /// Consecutive dialogue-only lines at which the chapter is flagged
    #[serde(default = "default_dialogue_run_limit")]
    dialogue_run_limit: usize,

    /// Trailing characters inspected for moralizing closings
    #[serde(default = "default_closing_window_chars")]
    closing_window_chars: usize,

    /// Extra regex patterns that mark a premature ending
    #[serde(default)]
    extra_finale_patterns: Vec<String>,
}

fn default_min_body_chars() -> usize {
    2500
}

fn default_max_body_chars() -> usize {
    12000
}

fn default_min_paragraphs() -> usize {
    5
}

fn default_min_dialogue_ratio() -> f64 {
    0.05
}

fn default_bland_paragraph_chars() -> usize {
    200
}

fn default_long_paragraph_chars() -> usize {
    500
}

fn default_max_long_paragraphs() -> usize {
    2
}

fn default_dialogue_run_limit() -> usize {
    5
}

fn default_closing_window_chars() -> usize {
    300
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_body_chars: default_min_body_chars(),
            max_body_chars: default_max_body_chars(),
            min_paragraphs: default_min_paragraphs(),
            min_dialogue_ratio: default_min_dialogue_ratio(),
            bland_paragraph_chars: default_bland_paragraph_chars(),
            long_paragraph_chars: default_long_paragraph_chars(),
            max_long_paragraphs: default_max_long_paragraphs(),
            dialogue_run_limit: default_dialogue_run_limit(),
            closing_window_chars: default_closing_window_chars(),
            extra_finale_patterns: Vec::new(),
        }
    }
}

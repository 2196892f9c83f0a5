//! Per-chapter inputs to the quality checks.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serialist_error::BuilderError;
use serialist_story::PacingType;

/// What the checks need to know about the chapter being judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct QcContext {
    /// Chapter number
    chapter_index: u32,
    /// Planned length of the story
    total_chapters: u32,
    /// Whether this is the last chapter, where a finale is expected
    #[builder(default)]
    is_final: bool,
    /// Outline goal for the chapter
    #[builder(default, setter(strip_option))]
    goal: Option<String>,
    /// Smoothed tension target
    #[builder(default, setter(strip_option))]
    pacing_target: Option<f64>,
    /// Category of the tension target
    #[builder(default, setter(strip_option))]
    pacing_type: Option<PacingType>,
    /// Rendered character state
    #[builder(default)]
    character_context: String,
}

impl QcContext {
    /// Create a builder.
    pub fn builder() -> QcContextBuilder {
        QcContextBuilder::default()
    }

    /// Minimal context for `chapter_index` of `total_chapters`; the last
    /// chapter is marked final.
    pub fn for_chapter(chapter_index: u32, total_chapters: u32) -> Self {
        Self {
            chapter_index,
            total_chapters,
            is_final: total_chapters > 0 && chapter_index >= total_chapters,
            goal: None,
            pacing_target: None,
            pacing_type: None,
            character_context: String::new(),
        }
    }
}

impl QcContextBuilder {
    /// Build the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the chapter index or total is missing.
    pub fn build(&self) -> Result<QcContext, BuilderError> {
        self.build_internal()
            .map_err(|e| BuilderError::missing_field(e))
    }
}

//! The static story bible.

use crate::{ChapterOutline, CharacterProfile};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// World and character setup fixed before the first chapter.
///
/// # Examples
///
/// ```
/// use serialist_core::{Bible, ChapterOutline};
///
/// let bible = Bible::new("The Salt Archive", 40)
///     .with_premise("An archivist uncovers a drowned city.")
///     .with_outline(vec![ChapterOutline::new(1, "Low Tide", "Introduce Lin", "A bell rings")]);
///
/// assert_eq!(*bible.total_chapters(), 40);
/// assert_eq!(bible.outline_for(1).unwrap().title, "Low Tide");
/// assert!(bible.outline_for(2).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters)]
pub struct Bible {
    title: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    premise: String,
    #[serde(default)]
    world: String,
    #[serde(default)]
    style_guide: String,
    total_chapters: u32,
    #[serde(default)]
    characters: Vec<CharacterProfile>,
    #[serde(default)]
    outline: Vec<ChapterOutline>,
}

impl Bible {
    /// Creates a bible with a title and a target chapter count.
    pub fn new(title: impl Into<String>, total_chapters: u32) -> Self {
        Self {
            title: title.into(),
            total_chapters,
            ..Self::default()
        }
    }

    /// Sets the genre.
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    /// Sets the premise.
    pub fn with_premise(mut self, premise: impl Into<String>) -> Self {
        self.premise = premise.into();
        self
    }

    /// Sets the world description.
    pub fn with_world(mut self, world: impl Into<String>) -> Self {
        self.world = world.into();
        self
    }

    /// Sets the style guide.
    pub fn with_style_guide(mut self, style_guide: impl Into<String>) -> Self {
        self.style_guide = style_guide.into();
        self
    }

    /// Sets the character profiles.
    pub fn with_characters(mut self, characters: Vec<CharacterProfile>) -> Self {
        self.characters = characters;
        self
    }

    /// Sets the chapter outline.
    pub fn with_outline(mut self, outline: Vec<ChapterOutline>) -> Self {
        self.outline = outline;
        self
    }

    /// Looks up the outline entry for a chapter.
    pub fn outline_for(&self, chapter: u32) -> Option<&ChapterOutline> {
        self.outline.iter().find(|o| o.index == chapter)
    }

    /// Looks up a character profile by id.
    pub fn character(&self, id: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Renders the static part of the bible for prompt inclusion.
    pub fn render(&self) -> String {
        let mut sections = vec![format!("Title: {}", self.title)];
        if !self.genre.is_empty() {
            sections.push(format!("Genre: {}", self.genre));
        }
        if !self.premise.is_empty() {
            sections.push(format!("Premise: {}", self.premise));
        }
        if !self.world.is_empty() {
            sections.push(format!("World: {}", self.world));
        }
        if !self.style_guide.is_empty() {
            sections.push(format!("Style: {}", self.style_guide));
        }
        sections.join("\n")
    }
}

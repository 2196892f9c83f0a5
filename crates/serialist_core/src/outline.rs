//! Chapter outline entries.

use serde::{Deserialize, Serialize};

/// Planned beat for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChapterOutline {
    /// One-based chapter index
    pub index: u32,
    /// Working title
    #[serde(default)]
    pub title: String,
    /// What the chapter must accomplish
    #[serde(default)]
    pub goal: String,
    /// Closing hook leading into the next chapter
    #[serde(default)]
    pub hook: String,
}

impl ChapterOutline {
    /// Creates an outline entry.
    pub fn new(
        index: u32,
        title: impl Into<String>,
        goal: impl Into<String>,
        hook: impl Into<String>,
    ) -> Self {
        Self {
            index,
            title: title.into(),
            goal: goal.into(),
            hook: hook.into(),
        }
    }

    /// Renders the entry for prompt inclusion.
    pub fn render(&self) -> String {
        let mut out = format!("Chapter {}: {}", self.index, self.title);
        if !self.goal.is_empty() {
            out.push_str(&format!("\nGoal: {}", self.goal));
        }
        if !self.hook.is_empty() {
            out.push_str(&format!("\nClosing hook: {}", self.hook));
        }
        out
    }
}

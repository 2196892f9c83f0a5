//! In-story chronology.

use crate::extraction::{parse_lenient_list, parse_model_payload};
use serde::{Deserialize, Serialize};
use serialist_error::SerialistResult;

/// Events retained in the timeline; older ones are dropped first.
pub const MAX_TIMELINE_EVENTS: usize = 50;

/// Events rendered into the prompt.
const RENDERED_EVENTS: usize = 5;

/// One dated happening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Chapter it happened in
    pub chapter: u32,
    /// In-story time marker, e.g. "Day 3, dusk"
    pub marker: String,
    /// What happened
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ExtractedEvent {
    #[serde(default, alias = "time", alias = "time_marker")]
    marker: Option<String>,
    #[serde(alias = "event", alias = "content")]
    description: String,
}

/// Timeline changes extracted from one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimelineUpdate {
    /// New current time, if the chapter moved time forward
    pub current_marker: Option<String>,
    /// `(marker, description)` pairs; a missing marker means the current one
    pub events: Vec<(Option<String>, String)>,
}

impl TimelineUpdate {
    /// Parse a timeline-extraction response.
    ///
    /// # Errors
    ///
    /// Returns an error if the response contains no JSON at all.
    pub fn parse_response(response: &str) -> SerialistResult<Self> {
        let payload = parse_model_payload(response)?;
        let current_marker = ["current_marker", "current_time", "time_marker"]
            .iter()
            .find_map(|k| payload.get(*k))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let events: Vec<ExtractedEvent> = parse_lenient_list(payload.get("events"), "events");
        Ok(Self {
            current_marker,
            events: events
                .into_iter()
                .map(|e| (e.marker, e.description))
                .collect(),
        })
    }
}

/// Bounded chronology with the current in-story time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelineState {
    /// Current in-story time
    pub current_marker: String,
    /// Oldest first, at most [`MAX_TIMELINE_EVENTS`]
    pub events: Vec<TimelineEvent>,
    /// Last chapter applied
    pub last_updated_chapter: u32,
}

impl TimelineState {
    /// Apply a chapter's update, returning the next timeline.
    pub fn apply(&self, update: &TimelineUpdate, chapter: u32) -> Self {
        let mut next = self.clone();
        if let Some(marker) = &update.current_marker {
            next.current_marker = marker.clone();
        }
        for (marker, description) in &update.events {
            let description = description.trim();
            if description.is_empty() {
                continue;
            }
            let marker = marker
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| next.current_marker.clone());
            next.events.push(TimelineEvent {
                chapter,
                marker,
                description: description.to_string(),
            });
        }
        if next.events.len() > MAX_TIMELINE_EVENTS {
            let excess = next.events.len() - MAX_TIMELINE_EVENTS;
            next.events.drain(..excess);
        }
        next.last_updated_chapter = next.last_updated_chapter.max(chapter);
        next
    }

    /// Render the current time and the latest events as a prompt section.
    pub fn render(&self) -> String {
        if self.current_marker.is_empty() && self.events.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        if !self.current_marker.is_empty() {
            out.push_str(&format!("Current time: {}", self.current_marker));
        }
        let start = self.events.len().saturating_sub(RENDERED_EVENTS);
        for event in &self.events[start..] {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "- Chapter {} [{}]: {}",
                event.chapter, event.marker, event.description
            ));
        }
        out
    }
}

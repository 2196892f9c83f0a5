//! Rolling three-band story summary.

use crate::extraction::{parse_lenient_list, parse_model_payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serialist_error::{JsonError, JsonErrorKind, SerialistResult};

/// Compressed recap of the story so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RollingSummary {
    /// Whole story, heavily compressed
    pub long_term: String,
    /// Current arc
    pub mid_term: String,
    /// Latest chapters in detail
    pub recent: String,
    /// Last chapter folded in
    pub last_updated_chapter: u32,
}

impl RollingSummary {
    /// True when no band has content.
    pub fn is_empty(&self) -> bool {
        self.long_term.is_empty() && self.mid_term.is_empty() && self.recent.is_empty()
    }

    /// Render the non-empty bands as a prompt section.
    pub fn render(&self) -> String {
        [
            ("Story so far", &self.long_term),
            ("Current arc", &self.mid_term),
            ("Most recently", &self.recent),
        ]
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(label, text)| format!("{}:\n{}", label, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
    }

    /// Fold an update in, returning the next summary and open loops.
    ///
    /// Empty bands in the update keep the previous text. Open loops are
    /// replaced wholesale, deduplicated and capped at `max_open_loops`.
    pub fn apply(
        &self,
        update: &SummaryUpdate,
        chapter: u32,
        max_open_loops: usize,
    ) -> (RollingSummary, Vec<String>) {
        let pick = |new: &str, old: &str| {
            let new = new.trim();
            if new.is_empty() { old.to_string() } else { new.to_string() }
        };
        let summary = RollingSummary {
            long_term: pick(&update.long_term, &self.long_term),
            mid_term: pick(&update.mid_term, &self.mid_term),
            recent: pick(&update.recent, &self.recent),
            last_updated_chapter: self.last_updated_chapter.max(chapter),
        };

        let mut loops: Vec<String> = Vec::new();
        for item in &update.open_loops {
            let item = item.trim();
            if !item.is_empty() && !loops.iter().any(|l| l == item) {
                loops.push(item.to_string());
            }
        }
        if loops.len() > max_open_loops {
            tracing::debug!(
                dropped = loops.len() - max_open_loops,
                "Truncating open loops"
            );
            loops.truncate(max_open_loops);
        }
        (summary, loops)
    }
}

/// Summary bands and open loops produced by a summary call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryUpdate {
    /// Replacement long-term band
    pub long_term: String,
    /// Replacement mid-term band
    pub mid_term: String,
    /// Replacement recent band
    pub recent: String,
    /// Unresolved threads after this chapter
    pub open_loops: Vec<String>,
}

fn band(payload: &Value, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|n| payload.get(*n))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl SummaryUpdate {
    /// Parse a summary response.
    ///
    /// # Errors
    ///
    /// Returns an error if the response has no JSON or every band is empty.
    pub fn parse_response(response: &str) -> SerialistResult<Self> {
        let payload = parse_model_payload(response)?;
        let update = Self {
            long_term: band(&payload, &["long_term", "longTerm", "long"]),
            mid_term: band(&payload, &["mid_term", "midTerm", "mid"]),
            recent: band(&payload, &["recent", "recent_summary", "short_term"]),
            open_loops: parse_lenient_list(
                payload.get("open_loops").or_else(|| payload.get("openLoops")),
                "open_loops",
            ),
        };
        if update.long_term.is_empty() && update.mid_term.is_empty() && update.recent.is_empty() {
            return Err(JsonError::new(JsonErrorKind::MissingContent("summary text".to_string())).into());
        }
        Ok(update)
    }
}

//! Self-review verdicts.

use serde::{Deserialize, Serialize};
use serialist_story::{parse_lenient_list, parse_model_payload};

/// Brief used when the reviewer asks for a rewrite without saying why.
pub const GENERIC_REWRITE_BRIEF: &str = "- Tighten the prose and cut repetition\n\
- Keep every character consistent with the established facts\n\
- End on a clear hook into the next chapter";

/// What the reviewer wants done with the draft.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReviewAction {
    /// Draft is good enough
    #[default]
    Keep,
    /// Redraft with the listed issues and guidance
    Rewrite,
}

/// Parsed self-review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelfReview {
    /// Requested action
    pub action: ReviewAction,
    /// Problems found
    pub issues: Vec<String>,
    /// Direction for the rewrite
    pub guidance: String,
}

impl SelfReview {
    /// Parse a review response.
    ///
    /// Anything that cannot be read as a rewrite request is a keep, so a
    /// confused reviewer never triggers a redraft.
    pub fn parse_response(response: &str) -> Self {
        let Ok(payload) = parse_model_payload(response) else {
            tracing::debug!("Review response has no JSON, keeping draft");
            return Self::default();
        };

        let action = payload
            .get("action")
            .and_then(|v| v.as_str())
            .and_then(|s| s.trim().parse::<ReviewAction>().ok())
            .unwrap_or_default();
        let issues: Vec<String> = parse_lenient_list(payload.get("issues"), "review_issues");
        let guidance = payload
            .get("guidance")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Self {
            action,
            issues,
            guidance,
        }
    }

    /// Whether the reviewer asked for a rewrite.
    pub fn wants_rewrite(&self) -> bool {
        self.action == ReviewAction::Rewrite
    }

    /// Issues and guidance as a rewrite brief.
    ///
    /// A bare rewrite request gets [`GENERIC_REWRITE_BRIEF`].
    pub fn render_brief(&self) -> String {
        if self.issues.is_empty() && self.guidance.is_empty() {
            return GENERIC_REWRITE_BRIEF.to_string();
        }
        let mut out = String::new();
        for issue in &self.issues {
            out.push_str(&format!("- {}\n", issue));
        }
        if !self.guidance.is_empty() {
            out.push_str(&format!("Guidance: {}", self.guidance));
        }
        out.trim_end().to_string()
    }
}

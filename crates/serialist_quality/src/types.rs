//! Quality check results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// How serious an issue is. Ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    /// Worth fixing, never blocks
    #[serde(alias = "Minor", alias = "MINOR")]
    Minor,
    /// Blocks the quick check
    #[serde(alias = "Major", alias = "MAJOR")]
    Major,
    /// Blocks every check
    #[serde(alias = "Critical", alias = "CRITICAL")]
    Critical,
}

impl Severity {
    /// Points deducted from the dimension score.
    pub fn deduction(&self) -> f64 {
        match self {
            Severity::Minor => 5.0,
            Severity::Major => 15.0,
            Severity::Critical => 40.0,
        }
    }
}

/// Scored aspect of a chapter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QcDimension {
    /// No premature finale
    Ending,
    /// Length, paragraphs, dialogue and prose texture
    Structure,
    /// Characters behave consistently with their state
    Character,
    /// Chapter matches its tension target
    Pacing,
    /// Chapter achieves its outline goal
    Goal,
}

impl QcDimension {
    /// Weight in the composite score.
    pub fn weight(&self) -> f64 {
        match self {
            QcDimension::Ending => 0.25,
            QcDimension::Character => 0.25,
            QcDimension::Pacing => 0.20,
            QcDimension::Goal => 0.20,
            QcDimension::Structure => 0.10,
        }
    }

    /// Whether the dimension needs a model call.
    pub fn is_model_based(&self) -> bool {
        matches!(self, QcDimension::Character | QcDimension::Pacing | QcDimension::Goal)
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcIssue {
    /// Short machine-readable label, e.g. `too_short`
    #[serde(alias = "type")]
    pub issue_type: String,
    /// Dimension the finding counts against
    pub dimension: QcDimension,
    /// How serious it is
    pub severity: Severity,
    /// What is wrong
    pub description: String,
    /// How to fix it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl QcIssue {
    /// Create an issue without a suggestion.
    pub fn new(
        dimension: QcDimension,
        issue_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            dimension,
            severity,
            description: description.into(),
            suggestion: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of a quality check.
///
/// `passed` is true iff no issue is at or above `gate`. The score is
/// informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcResult {
    /// Whether the chapter clears the gate
    pub passed: bool,
    /// Weighted composite, 0 to 100
    pub score: f64,
    /// All findings, in detection order
    pub issues: Vec<QcIssue>,
    /// Score per dimension, 0 to 100
    pub dimension_scores: BTreeMap<QcDimension, f64>,
    /// Model-based dimensions that were not evaluated
    #[serde(default)]
    pub skipped: Vec<QcDimension>,
    /// Lowest severity that fails the check
    pub gate: Severity,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
}

impl QcResult {
    /// Score every dimension and apply the gate.
    ///
    /// Dimensions present in `overrides` take that score; every other
    /// dimension starts at 100 and loses its issues' deductions, floored at 0.
    pub fn evaluate(
        issues: Vec<QcIssue>,
        gate: Severity,
        overrides: BTreeMap<QcDimension, f64>,
        skipped: Vec<QcDimension>,
    ) -> Self {
        let dimension_scores: BTreeMap<QcDimension, f64> = QcDimension::iter()
            .map(|dimension| {
                let score = overrides.get(&dimension).copied().unwrap_or_else(|| {
                    let deducted: f64 = issues
                        .iter()
                        .filter(|i| i.dimension == dimension)
                        .map(|i| i.severity.deduction())
                        .sum();
                    100.0 - deducted
                });
                (dimension, score.clamp(0.0, 100.0))
            })
            .collect();

        let score = dimension_scores
            .iter()
            .map(|(dimension, score)| dimension.weight() * score)
            .sum::<f64>();
        let passed = !issues.iter().any(|i| i.severity >= gate);

        Self {
            passed,
            score: (score * 10.0).round() / 10.0,
            issues,
            dimension_scores,
            skipped,
            gate,
            timestamp: Utc::now(),
        }
    }

    /// Issues at or above the gate.
    pub fn failures(&self) -> impl Iterator<Item = &QcIssue> {
        self.issues.iter().filter(|i| i.severity >= self.gate)
    }

    /// The first issue that fails the gate.
    pub fn first_failure(&self) -> Option<&QcIssue> {
        self.failures().next()
    }

    /// Whether any issue is critical.
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    /// Render failing issues as a numbered list for a rewrite prompt.
    pub fn render_failures(&self) -> String {
        self.failures()
            .enumerate()
            .map(|(n, issue)| match &issue.suggestion {
                Some(s) => format!("{}. [{}] {} ({})", n + 1, issue.severity, issue.description, s),
                None => format!("{}. [{}] {}", n + 1, issue.severity, issue.description),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

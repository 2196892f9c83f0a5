//! Per-chapter timing and call accounting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pipeline stage.
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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Scene plan
    Plan,
    /// First draft
    Draft,
    /// Self-review rounds and their rewrites
    SelfReview,
    /// Rule gate and its rewrites
    QuickQc,
    /// Model-based checks
    FullQc,
    /// Repair after a failed full check
    Repair,
    /// Character, plot and timeline extraction
    StateExtraction,
    /// Rolling summary update
    SummaryUpdate,
}

/// Totals for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseStats {
    /// Logical model calls made in the phase
    pub calls: u32,
    /// Wall-clock time spent, milliseconds
    pub elapsed_ms: u64,
}

/// Where a chapter's time and model calls went.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    phases: BTreeMap<Phase, PhaseStats>,
}

impl PipelineDiagnostics {
    /// Empty diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add time and calls to a phase.
    pub fn record(&mut self, phase: Phase, elapsed: Duration, calls: u32) {
        let stats = self.phases.entry(phase).or_default();
        stats.calls += calls;
        stats.elapsed_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Totals for a phase; zero if it never ran.
    pub fn phase(&self, phase: Phase) -> PhaseStats {
        self.phases.get(&phase).copied().unwrap_or_default()
    }

    /// Logical model calls across all phases.
    pub fn total_calls(&self) -> u32 {
        self.phases.values().map(|s| s.calls).sum()
    }

    /// Time across all phases, milliseconds.
    pub fn total_elapsed_ms(&self) -> u64 {
        self.phases.values().map(|s| s.elapsed_ms).sum()
    }

    /// Phases that ran, in pipeline order.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, PhaseStats)> + '_ {
        self.phases.iter().map(|(phase, stats)| (*phase, *stats))
    }
}

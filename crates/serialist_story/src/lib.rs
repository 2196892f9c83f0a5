//! Long-lived narrative state for the Serialist pipeline.
//!
//! Every type here is a plain value: operations take the current state by
//! reference and return the next state, leaving the input untouched. The
//! caller persists whatever comes back.
//!
//! - [`CharacterStateRegistry`]: per-character physical, psychological and
//!   social state updated from extracted deltas
//! - [`PlotGraph`]: append-only causal graph of plot nodes and edges, with
//!   pending foreshadowing tracked by age
//! - [`NarrativeArc`]: per-volume tension curves and the per-chapter
//!   [`NarrativeGuide`] derived from them
//! - [`TimelineState`]: in-story time markers
//! - [`RollingSummary`]: long/mid/recent compressed recap
//!
//! Model output is parsed leniently: malformed items are dropped one by one
//! instead of failing a whole payload.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod character;
mod extraction;
mod pacing;
mod plot;
mod summary;
mod timeline;

pub use character::{
    CharacterCondition, CharacterDelta, CharacterStateRegistry, CharacterStateSnapshot,
    ConsistencyIssue, ConsistencyReport, PhysicalState, PsychologicalState, SocialState,
    StateChange, MAX_RECENT_CHANGES,
};
pub use extraction::{extract_json, parse_json, parse_lenient_list, parse_model_payload};
pub use pacing::{
    BalanceCheck, NarrativeArc, NarrativeGuide, PacingType, VolumePacingCurve, MAX_PACING_STEP,
};
pub use plot::{
    NewPlotEdge, NewPlotNode, PendingForeshadowing, PlotAnalysis, PlotContextConfig,
    PlotContextConfigBuilder, PlotEdge, PlotGraph, PlotNode, PlotNodeType, PlotRelation,
    PlotStatus, StatusUpdate,
};
pub use summary::{RollingSummary, SummaryUpdate};
pub use timeline::{TimelineEvent, TimelineState, TimelineUpdate, MAX_TIMELINE_EVENTS};

//! Chapter generation pipeline for Serialist.
//!
//! This crate turns a project's state into the next chapter. It assembles a
//! bounded context, drives the model through planning, drafting, review and
//! quality gates, then extracts the state changes the chapter introduced.
//!
//! # Features
//!
//! - **Bounded context**: cached sections, dropped by priority to fit a budget
//! - **Quality gates**: rule checks with rewrites, optional model checks with repair
//! - **Graceful degradation**: only the draft and the final gate can fail a chapter
//! - **State extraction**: characters, plot and timeline updated concurrently
//! - **Persistence**: in-memory and JSON file project stores
//!
//! # Example
//!
//! ```rust,ignore
//! use serialist_cache::ContextCache;
//! use serialist_pipeline::{
//!     ChapterRequest, FileProjectStore, GenerationOrchestrator, ProjectStore, SerialistConfig,
//! };
//!
//! # async fn example(model: std::sync::Arc<dyn serialist_interface::TextGenerator>) -> serialist_error::SerialistResult<()> {
//! let config = SerialistConfig::load()?;
//! let store = FileProjectStore::new("projects")?;
//! let orchestrator = GenerationOrchestrator::from_providers(vec![model], &config)?;
//! let mut cache = ContextCache::new(config.cache().clone());
//!
//! let state = store.load("harbor-lights").await?;
//! let outcome = orchestrator
//!     .generate_chapter(&mut cache, ChapterRequest::new("harbor-lights", 7, state.clone()))
//!     .await?;
//! store.save("harbor-lights", &state.with_outcome(&outcome)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assembler;
mod config;
mod diagnostics;
mod duplicates;
mod orchestrator;
pub mod prompts;
mod review;
mod store;

pub use assembler::{AssembledContext, ContextAssembler, state_version};
pub use config::{PipelineConfig, PipelineConfigBuilder, SerialistConfig, StageSettings};
pub use diagnostics::{Phase, PhaseStats, PipelineDiagnostics};
pub use duplicates::{
    DUPLICATE_EVENT_WINDOW, DUPLICATE_OVERLAP_THRESHOLD, DuplicateWarning, detect_duplicate_events,
    significant_words,
};
pub use orchestrator::{ChapterOutcome, ChapterRequest, ChapterRequestBuilder, GenerationOrchestrator};
pub use review::{GENERIC_REWRITE_BRIEF, ReviewAction, SelfReview};
pub use store::{FileProjectStore, InMemoryProjectStore, ProjectState, ProjectStore};

//! Serialist - stateful chapter generation for serialized fiction
//!
//! Serialist writes one chapter at a time of a long story over a large
//! language model. Each chapter is drafted from a bounded context assembled
//! out of the story bible, character state, the causal plot graph, a rolling
//! summary and a tension curve. The draft is then reviewed, gated by quality
//! checks, and mined for the state the next chapter needs.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use serialist::{
//!     ChapterRequest, ContextCache, FileProjectStore, GenerationOrchestrator, ProjectStore,
//!     SerialistConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SerialistConfig::load()?;
//!     let writer = Arc::new(MyProvider::new());
//!     let orchestrator = GenerationOrchestrator::new(writer, &config)?;
//!
//!     let store = FileProjectStore::new("projects")?;
//!     let state = store.load("harbor-lights").await?;
//!     let mut cache = ContextCache::new(config.cache().clone());
//!
//!     let request = ChapterRequest::new("harbor-lights", 2, state.clone());
//!     let outcome = orchestrator.generate_chapter(&mut cache, request).await?;
//!     store.save("harbor-lights", &state.with_outcome(&outcome)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `observability` - Export tracing spans through OpenTelemetry
//!
//! # Architecture
//!
//! Serialist is organized as a workspace with focused crates:
//!
//! - `serialist_error` - Error types
//! - `serialist_core` - Bible, outline, character profiles and model requests
//! - `serialist_interface` - `TextGenerator` trait definition
//! - `serialist_retry` - Retry policy and provider fallback
//! - `serialist_cache` - Versioned context cache
//! - `serialist_story` - Characters, plot graph, pacing, timeline and summary
//! - `serialist_quality` - Rule-based and model-assisted quality checks
//! - `serialist_pipeline` - Context assembly, orchestration and persistence
//!
//! This crate (`serialist`) re-exports everything for convenience and hosts
//! the command-line tools.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use serialist_cache::*;
pub use serialist_core::*;
pub use serialist_error::*;
pub use serialist_interface::*;
pub use serialist_pipeline::*;
pub use serialist_quality::*;
pub use serialist_retry::*;
pub use serialist_story::*;

pub mod cli;
mod observability;

pub use observability::{LoggingConfig, init_logging};

//! Chapter quality control for the Serialist pipeline.
//!
//! Two levels of checking:
//!
//! - [`QualityControlEngine::run_quick_qc`]: synchronous rule checks
//!   (premature ending, length, paragraphs, dialogue density, prose
//!   texture), cheap enough to run inside rewrite loops. Fails on any major
//!   or critical issue.
//! - [`QualityControlEngine::run_full_qc`]: the same rules plus character,
//!   pacing and goal checks by a model, run concurrently and individually
//!   best-effort. Fails only on a critical issue.
//!
//! Both produce a [`QcResult`] with a weighted composite score.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod engine;
mod rules;
mod types;

pub use config::{QualityConfig, QualityConfigBuilder};
pub use context::{QcContext, QcContextBuilder};
pub use engine::QualityControlEngine;
pub use rules::RuleSet;
pub use types::{QcDimension, QcIssue, QcResult, Severity};

//! Error types for the Serialist chapter-generation pipeline.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Model-call failures carry a six-way classification ([`ModelErrorKind`])
//! that drives retry and provider fallback through [`RetryableError`].
//!
//! # Examples
//!
//! ```
//! use serialist_error::{SerialistResult, PipelineError, PipelineErrorKind};
//!
//! fn gate() -> SerialistResult<String> {
//!     Err(PipelineError::new(PipelineErrorKind::QualityGate {
//!         chapter: 3,
//!         reason: "chapter body under minimum length".into(),
//!     }))?
//! }
//!
//! match gate() {
//!     Ok(text) => println!("{}", text),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;
mod json;
mod model;
mod pipeline;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use config::{ConfigError, ConfigErrorKind};
pub use error::{SerialistError, SerialistErrorKind, SerialistResult};
pub use json::{JsonError, JsonErrorKind};
pub use model::{ModelError, ModelErrorKind, ModelResult, RetryableError};
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use storage::{StorageError, StorageErrorKind};

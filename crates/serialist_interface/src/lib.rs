//! Trait definitions for the Serialist pipeline.
//!
//! The pipeline never talks to a model provider directly. Everything it
//! needs from a provider is expressed by [`TextGenerator`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::TextGenerator;

//! Core data types for the Serialist chapter-generation pipeline.
//!
//! This crate holds the read-only inputs every other crate agrees on: the
//! model request shape, the story bible, character profiles and chapter
//! outlines.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bible;
mod outline;
mod profile;
mod request;

pub use bible::Bible;
pub use outline::ChapterOutline;
pub use profile::{CharacterProfile, CharacterRole};
pub use request::{GenerateRequest, GenerateRequestBuilder};

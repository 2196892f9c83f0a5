//! Context caching keyed on narrative state versions.
//!
//! Assembled prompt sections are expensive to rebuild and only change when
//! the underlying state changes. [`ContextCache`] keeps them in memory,
//! keyed by project, section type and chapter, and drops an entry as soon as
//! it is read with a newer [`StateVersion`] or outlives its TTL.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod version;

pub use config::{ContextCacheConfig, ContextCacheConfigBuilder};
pub use context::{CacheEntry, CacheKey, CacheStats, ContextCache, ContextType};
pub use version::StateVersion;

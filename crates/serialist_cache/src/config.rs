//! Cache configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Configuration for the context cache.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct ContextCacheConfig {
    /// Default TTL for cached entries (seconds)
    #[serde(default = "default_ttl_secs")]
    default_ttl_secs: u64,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_size")]
    max_size: usize,

    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_max_size() -> usize {
    500
}

fn default_enabled() -> bool {
    true
}

impl Default for ContextCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_size: default_max_size(),
            enabled: default_enabled(),
        }
    }
}

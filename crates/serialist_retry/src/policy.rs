//! Retry policy configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serialist_error::ModelErrorKind;
use std::time::Duration;

/// Backoff, retry budget and call timeout for model calls.
///
/// # Examples
///
/// ```
/// use serialist_retry::RetryPolicy;
///
/// let policy = RetryPolicy::default().with_max_retries(5_usize);
/// assert_eq!(*policy.max_retries(), 5);
/// assert_eq!(*policy.timeout_secs(), 180);
/// ```
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
pub struct RetryPolicy {
    /// Retries per provider after the first attempt
    #[serde(default = "default_max_retries")]
    max_retries: usize,

    /// Initial backoff for server, timeout and unknown failures (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,

    /// Initial backoff for rate-limit failures (milliseconds)
    #[serde(default = "default_rate_limit_delay_ms")]
    rate_limit_delay_ms: u64,

    /// Upper bound on a single backoff delay (seconds)
    #[serde(default = "default_max_delay_secs")]
    max_delay_secs: u64,

    /// Hard wall-clock limit on one model call (seconds)
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_delay_ms() -> u64 {
    15_000
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetryPolicy {
    /// Retry strategy parameters for a classified failure.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`. Permanent
    /// failures get a zero retry budget.
    pub fn params_for(&self, kind: &ModelErrorKind) -> (u64, usize, u64) {
        if !kind.is_retryable() {
            return (0, 0, 0);
        }
        let initial_ms = match kind {
            ModelErrorKind::RateLimit(_) => self.rate_limit_delay_ms,
            _ => self.base_delay_ms,
        };
        (initial_ms, self.max_retries, self.max_delay_secs)
    }

    /// Per-call timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum wait before retrying a failure of this class, if any.
    pub fn retry_after(&self, kind: &ModelErrorKind) -> Option<Duration> {
        match kind {
            ModelErrorKind::RateLimit(_) => Some(Duration::from_millis(self.rate_limit_delay_ms)),
            _ => None,
        }
    }
}

//! Retry and provider fallback for model calls.
//!
//! Every model call made by the pipeline goes through a [`FallbackGenerator`]:
//!
//! - each attempt runs under a hard wall-clock timeout, classified as
//!   `timeout` when it expires;
//! - retryable failures (`rate_limit`, `server_error`, `timeout`, `unknown`)
//!   are retried with exponential backoff, rate limits starting from a much
//!   longer delay;
//! - permanent failures (`auth_error`, `invalid_request`) surface immediately;
//! - when a provider exhausts its retries the next provider is tried with the
//!   same budget.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod fallback;
mod policy;

pub use fallback::FallbackGenerator;
pub use policy::{RetryPolicy, RetryPolicyBuilder};

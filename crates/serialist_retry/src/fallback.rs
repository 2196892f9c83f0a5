//! Provider fallback chain with classified retry.

use crate::RetryPolicy;
use async_trait::async_trait;
use serialist_core::GenerateRequest;
use serialist_error::{
    ModelError, ModelErrorKind, ModelResult, PipelineError, PipelineErrorKind, RetryableError,
    SerialistResult,
};
use serialist_interface::TextGenerator;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, warn};

/// Ordered list of providers sharing one retry policy.
///
/// The primary provider is tried first. A retryable failure that survives the
/// whole retry budget moves on to the next provider; a permanent failure ends
/// the call immediately.
///
/// # Examples
///
/// ```no_run
/// use serialist_retry::{FallbackGenerator, RetryPolicy};
/// use serialist_interface::TextGenerator;
/// use std::sync::Arc;
///
/// # fn demo(primary: Arc<dyn TextGenerator>, backup: Arc<dyn TextGenerator>) -> serialist_error::SerialistResult<()> {
/// let generator = FallbackGenerator::new(vec![primary, backup], RetryPolicy::default())?;
/// assert_eq!(generator.provider_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FallbackGenerator {
    providers: Vec<Arc<dyn TextGenerator>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for FallbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .providers
            .iter()
            .map(|p| format!("{}/{}", p.provider_name(), p.model_name()))
            .collect();
        f.debug_struct("FallbackGenerator")
            .field("providers", &names)
            .field("policy", &self.policy)
            .finish()
    }
}

impl FallbackGenerator {
    /// Create a fallback chain. The first provider is the primary.
    ///
    /// # Errors
    ///
    /// Returns an error if `providers` is empty.
    #[track_caller]
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>, policy: RetryPolicy) -> SerialistResult<Self> {
        if providers.is_empty() {
            return Err(PipelineError::new(PipelineErrorKind::NoProviders).into());
        }
        Ok(Self { providers, policy })
    }

    /// Create a chain with a single provider.
    pub fn single(provider: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self {
            providers: vec![provider],
            policy,
        }
    }

    /// Number of providers in the chain.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// The retry policy applied to every provider.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One attempt under the hard wall-clock timeout.
    async fn attempt(
        &self,
        provider: &dyn TextGenerator,
        req: &GenerateRequest,
    ) -> ModelResult<String> {
        let limit = self.policy.timeout();
        match tokio::time::timeout(limit, provider.generate(req)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::new(ModelErrorKind::Timeout(format!(
                "{} did not answer within {}s",
                provider.provider_name(),
                limit.as_secs()
            )))),
        }
    }

    /// Call one provider, retrying retryable failures with backoff.
    ///
    /// The first attempt decides the backoff: a rate-limited first failure
    /// starts from the long rate-limit delay.
    async fn call_with_retry(
        &self,
        provider: &dyn TextGenerator,
        req: &GenerateRequest,
    ) -> ModelResult<String> {
        let first = self.attempt(provider, req).await;
        let (initial_ms, max_retries, max_delay_secs) = match &first {
            Ok(_) => return first,
            Err(e) => {
                if !e.is_retryable() {
                    warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "Permanent model error, failing immediately"
                    );
                    return first;
                }
                let params = self.policy.params_for(&e.kind);
                info!(
                    provider = provider.provider_name(),
                    error_class = e.kind.label(),
                    initial_backoff_ms = params.0,
                    max_retries = params.1,
                    max_delay_secs = params.2,
                    "Model call failed, will retry with configured strategy"
                );
                params
            }
        };

        if max_retries == 0 {
            return first;
        }

        // delay_n = 2^n * (initial / 2), so the first retry waits `initial_ms`
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor((initial_ms / 2).max(1))
            .max_delay(Duration::from_secs(max_delay_secs))
            .map(jitter)
            .take(max_retries);

        Retry::spawn(retry_strategy, move || async move {
            match self.attempt(provider, req).await {
                Ok(text) => Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "Model call failed, will retry"
                    );
                    let retry_after = self.policy.retry_after(&e.kind);
                    Err(RetryError::Transient {
                        err: e,
                        retry_after,
                    })
                }
                Err(e) => {
                    warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "Permanent model error, failing immediately"
                    );
                    Err(RetryError::Permanent(e))
                }
            }
        })
        .await
    }
}

#[async_trait]
impl TextGenerator for FallbackGenerator {
    #[tracing::instrument(
        skip(self, req),
        fields(providers = self.providers.len(), prompt_chars = req.prompt_chars())
    )]
    async fn generate(&self, req: &GenerateRequest) -> ModelResult<String> {
        let mut last_error = None;

        for (index, provider) in self.providers.iter().enumerate() {
            debug!(
                provider = provider.provider_name(),
                model = provider.model_name(),
                position = index,
                "Calling provider"
            );
            match self.call_with_retry(provider.as_ref(), req).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "Provider exhausted its retries, falling back"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ModelError::new(ModelErrorKind::Unknown("no providers configured".into()))
        }))
    }

    fn provider_name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.provider_name())
            .unwrap_or("fallback")
    }

    fn model_name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.model_name())
            .unwrap_or("none")
    }
}

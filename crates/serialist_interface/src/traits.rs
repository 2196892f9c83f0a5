//! Model-call capability.

use async_trait::async_trait;
use serialist_core::GenerateRequest;
use serialist_error::ModelResult;
use std::sync::Arc;

/// Core trait every model backend implements.
///
/// One call takes a system prompt and a user prompt and returns plain text.
/// Failures must be classified into a [`serialist_error::ModelErrorKind`] so
/// the retry layer can decide what to do with them.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the request.
    async fn generate(&self, req: &GenerateRequest) -> ModelResult<String>;

    /// Provider name (e.g., "anthropic", "openai", "local").
    fn provider_name(&self) -> &str;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, req: &GenerateRequest) -> ModelResult<String> {
        (**self).generate(req).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, req: &GenerateRequest) -> ModelResult<String> {
        (**self).generate(req).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

//! Request type for a single model call.

use serde::{Deserialize, Serialize};
use serialist_error::BuilderError;

/// A single text-generation request: one system prompt, one user prompt.
///
/// # Examples
///
/// ```
/// use serialist_core::GenerateRequest;
///
/// let request = GenerateRequest::builder()
///     .system("You are a novelist.")
///     .prompt("Write chapter 1.")
///     .temperature(0.8_f32)
///     .max_tokens(4096_u32)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.prompt, "Write chapter 1.");
/// assert_eq!(request.max_tokens, Some(4096));
/// assert!(request.model.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, derive_builder::Builder)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct GenerateRequest {
    /// System prompt framing the model's role
    pub system: String,
    /// User prompt carrying the task
    pub prompt: String,
    /// Sampling temperature
    #[builder(default, setter(strip_option))]
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[builder(default, setter(strip_option))]
    pub max_tokens: Option<u32>,
    /// Model identifier override
    #[builder(default, setter(strip_option))]
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Creates a new request builder.
    pub fn builder() -> GenerateRequestBuilder {
        GenerateRequestBuilder::default()
    }

    /// Creates a request from prompts with no sampling overrides.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Total prompt size in characters.
    pub fn prompt_chars(&self) -> usize {
        self.system.chars().count() + self.prompt.chars().count()
    }
}

impl GenerateRequestBuilder {
    /// Build the GenerateRequest.
    ///
    /// # Errors
    ///
    /// Returns error if the system or user prompt is missing.
    #[track_caller]
    pub fn build(&self) -> Result<GenerateRequest, BuilderError> {
        self.build_internal()
            .map_err(|e| BuilderError::missing_field(e))
    }
}

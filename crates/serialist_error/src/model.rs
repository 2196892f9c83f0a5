//! Model-call error classification and retry logic.

/// Classified model-call failure.
///
/// Every provider failure is mapped onto one of six classes. The class alone
/// decides whether the call is retried and with which backoff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ModelErrorKind {
    /// Provider refused the call because of quota or request rate
    #[display("Rate limited: {}", _0)]
    RateLimit(String),
    /// Provider-side failure (5xx, overloaded, unavailable)
    #[display("Server error: {}", _0)]
    ServerError(String),
    /// The call exceeded its wall-clock budget
    #[display("Timed out: {}", _0)]
    Timeout(String),
    /// Credentials rejected or missing
    #[display("Authentication failed: {}", _0)]
    AuthError(String),
    /// The request itself is malformed or unacceptable
    #[display("Invalid request: {}", _0)]
    InvalidRequest(String),
    /// Anything that could not be classified
    #[display("Unknown model error: {}", _0)]
    Unknown(String),
}

impl ModelErrorKind {
    /// Classify a provider failure from an optional HTTP-like status code and
    /// the provider's error message.
    ///
    /// # Examples
    ///
    /// ```
    /// use serialist_error::ModelErrorKind;
    ///
    /// let kind = ModelErrorKind::classify(Some(429), "quota exceeded");
    /// assert!(matches!(kind, ModelErrorKind::RateLimit(_)));
    ///
    /// let kind = ModelErrorKind::classify(None, "connection timed out");
    /// assert!(matches!(kind, ModelErrorKind::Timeout(_)));
    /// ```
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if let Some(status) = status {
            match status {
                429 => return Self::RateLimit(message),
                401 | 403 => return Self::AuthError(message),
                408 | 504 => return Self::Timeout(message),
                500..=599 => return Self::ServerError(message),
                400 | 404 | 413 | 422 => return Self::InvalidRequest(message),
                _ => {}
            }
        }

        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("quota") || lower.contains("too many") {
            Self::RateLimit(message)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout(message)
        } else if lower.contains("unauthorized")
            || lower.contains("api key")
            || lower.contains("forbidden")
            || lower.contains("auth")
        {
            Self::AuthError(message)
        } else if lower.contains("invalid") || lower.contains("bad request") {
            Self::InvalidRequest(message)
        } else if lower.contains("unavailable")
            || lower.contains("overloaded")
            || lower.contains("internal")
        {
            Self::ServerError(message)
        } else {
            Self::Unknown(message)
        }
    }

    /// Short label used in logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimit(_) => "rate_limit",
            Self::ServerError(_) => "server_error",
            Self::Timeout(_) => "timeout",
            Self::AuthError(_) => "auth_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Check if this error class should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit(_) | Self::ServerError(_) | Self::Timeout(_) | Self::Unknown(_)
        )
    }
}

/// Model-call error with source location tracking.
///
/// # Examples
///
/// ```
/// use serialist_error::{ModelError, ModelErrorKind, RetryableError};
///
/// let err = ModelError::new(ModelErrorKind::ServerError("503 unavailable".into()));
/// assert!(err.is_retryable());
/// assert!(format!("{}", err).contains("Server error"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Model Error: {} at line {} in {}", kind, line, file)]
pub struct ModelError {
    /// The kind of error that occurred
    pub kind: ModelErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ModelError {
    /// Create a new ModelError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ModelErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ModelErrorKind {
        &self.kind
    }
}

/// Errors the retry layer can ask whether another attempt may succeed.
///
/// Backoff timing is not part of the error; it comes from the caller's
/// retry policy.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ModelError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Result type for model calls.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

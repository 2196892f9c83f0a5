//! Top-level error wrapper types.

use crate::{BuilderError, ConfigError, JsonError, ModelError, PipelineError, StorageError};

/// Every error the workspace can surface to a caller.
///
/// # Examples
///
/// ```
/// use serialist_error::{SerialistError, JsonError, JsonErrorKind};
///
/// let err: SerialistError = JsonError::new(JsonErrorKind::Parse("unexpected end of input".into())).into();
/// assert!(format!("{}", err).contains("JSON Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum SerialistErrorKind {
    /// JSON extraction or (de)serialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Project persistence error
    #[from(StorageError)]
    Storage(StorageError),
    /// Model call failed after retries and fallback
    #[from(ModelError)]
    Model(ModelError),
    /// Chapter pipeline failure
    #[from(PipelineError)]
    Pipeline(PipelineError),
}

/// Serialist error with kind discrimination.
///
/// # Examples
///
/// ```
/// use serialist_error::{SerialistResult, ConfigError};
///
/// fn might_fail() -> SerialistResult<()> {
///     Err(ConfigError::invalid_value("retry.timeout_secs", "must be positive"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Serialist Error: {}", _0)]
pub struct SerialistError(Box<SerialistErrorKind>);

impl SerialistError {
    /// Create a new error from a kind.
    pub fn new(kind: SerialistErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SerialistErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to SerialistErrorKind
impl<T> From<T> for SerialistError
where
    T: Into<SerialistErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Serialist operations.
pub type SerialistResult<T> = std::result::Result<T, SerialistError>;

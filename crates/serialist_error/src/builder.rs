//! Errors from request and context builders.

/// Why a builder refused to produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BuilderErrorKind {
    /// A required field was never set
    #[display("Missing required field: {}", _0)]
    MissingField(String),
}

/// Builder error with the location of the failing `build()` call.
///
/// # Examples
///
/// ```
/// use serialist_error::{BuilderError, BuilderErrorKind};
///
/// let err = BuilderError::missing_field("`system` must be initialized");
/// assert!(matches!(err.kind(), BuilderErrorKind::MissingField(_)));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Builder Error: {} at line {} in {}", kind, line, file)]
pub struct BuilderError {
    kind: BuilderErrorKind,
    line: u32,
    file: &'static str,
}

impl BuilderError {
    /// Create a new error from a kind.
    #[track_caller]
    pub fn new(kind: BuilderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Wrap a generated builder's uninitialized-field message.
    #[track_caller]
    pub fn missing_field(detail: impl std::fmt::Display) -> Self {
        Self::new(BuilderErrorKind::MissingField(detail.to_string()))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BuilderErrorKind {
        &self.kind
    }
}

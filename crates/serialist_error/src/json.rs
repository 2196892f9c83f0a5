//! Errors from reading model payloads and project files.

/// Why a JSON payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum JsonErrorKind {
    /// Model output held no JSON object or array
    #[display("No JSON found in response of {} bytes", _0)]
    NotFound(usize),
    /// Text was found but did not deserialize
    #[display("Failed to parse JSON: {}", _0)]
    Parse(String),
    /// A value could not be written out
    #[display("Failed to serialize JSON: {}", _0)]
    Serialize(String),
    /// The payload parsed but lacks the content it exists to carry
    #[display("Payload is missing {}", _0)]
    MissingContent(String),
}

/// JSON error with source location.
///
/// # Examples
///
/// ```
/// use serialist_error::{JsonError, JsonErrorKind};
///
/// let err = JsonError::new(JsonErrorKind::NotFound(42));
/// assert_eq!(err.kind(), &JsonErrorKind::NotFound(42));
/// assert!(err.to_string().contains("42 bytes"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {} at line {} in {}", kind, line, file)]
pub struct JsonError {
    kind: JsonErrorKind,
    line: u32,
    file: &'static str,
}

impl JsonError {
    /// Create a new error from a kind.
    #[track_caller]
    pub fn new(kind: JsonErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &JsonErrorKind {
        &self.kind
    }
}

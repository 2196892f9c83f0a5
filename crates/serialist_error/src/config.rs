//! Configuration errors.

/// What went wrong while loading or checking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration source could not be read or merged
    #[display("Failed to load configuration: {}", _0)]
    Load(String),
    /// The merged sources did not match the expected shape
    #[display("Failed to parse configuration: {}", _0)]
    Parse(String),
    /// A key holds a value the pipeline cannot run with
    #[display("{} {}", key, reason)]
    InvalidValue {
        /// Dotted key, e.g. `pipeline.draft.temperature`
        key: String,
        /// What is wrong with the value
        reason: String,
    },
    /// A configured pattern does not compile
    #[display("Invalid regex pattern '{}': {}", pattern, reason)]
    InvalidPattern {
        /// The pattern as written
        pattern: String,
        /// Compiler message
        reason: String,
    },
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use serialist_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::invalid_value("retry.timeout_secs", "must be positive");
/// assert!(matches!(err.kind(), ConfigErrorKind::InvalidValue { .. }));
/// assert!(err.to_string().contains("retry.timeout_secs must be positive"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    line: u32,
    file: &'static str,
}

impl ConfigError {
    /// Create a new error from a kind.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for [`ConfigErrorKind::InvalidValue`].
    #[track_caller]
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        })
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}

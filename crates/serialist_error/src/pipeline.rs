//! Chapter pipeline error types.

/// Pipeline-level failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PipelineErrorKind {
    /// The chapter still failed quick QC after every rewrite attempt
    #[display("Chapter {} failed quality gate: {}", chapter, reason)]
    QualityGate {
        /// Chapter index
        chapter: u32,
        /// First failing issue
        reason: String,
    },
    /// A required stage produced no usable text
    #[display("Stage '{}' returned an empty response", _0)]
    EmptyResponse(String),
    /// No provider was configured for the fallback chain
    #[display("No model providers configured")]
    NoProviders,
    /// Caller-supplied input is inconsistent
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),
    /// Chapter outline missing for the requested index
    #[display("No outline for chapter {}", _0)]
    MissingOutline(u32),
}

/// Pipeline error with source location tracking.
///
/// # Examples
///
/// ```
/// use serialist_error::{PipelineError, PipelineErrorKind};
///
/// let err = PipelineError::new(PipelineErrorKind::QualityGate {
///     chapter: 7,
///     reason: "chapter body under minimum length".into(),
/// });
/// assert!(format!("{}", err).contains("under minimum length"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The kind of error that occurred
    pub kind: PipelineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PipelineErrorKind {
        &self.kind
    }
}

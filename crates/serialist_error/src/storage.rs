//! Project store error types.

/// Kinds of project store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create the store directory
    #[display("Failed to create store directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write a project file
    #[display("Failed to write project file: {}", _0)]
    FileWrite(String),
    /// Failed to read a project file
    #[display("Failed to read project file: {}", _0)]
    FileRead(String),
    /// No persisted state exists for the project
    #[display("Project not found: {}", _0)]
    NotFound(String),
    /// Project id cannot be mapped to a storage location
    #[display("Invalid project id: {}", _0)]
    InvalidProjectId(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use serialist_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("saga-7".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

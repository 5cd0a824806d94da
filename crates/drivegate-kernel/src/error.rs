//! Namespace and access error types.

use std::io;
use thiserror::Error;

/// Error type shared by the translator and the access controller.
///
/// Every failing operation returns one of these kinds and leaves the
/// filesystem and session state untouched.
#[derive(Debug, Error)]
pub enum GateError {
    /// Drive, file or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("not a file: {0}")]
    IsADirectory(String),

    /// A non-directory already occupies the path.
    #[error("a file with the same name already exists: {0}")]
    Conflict(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// The identity may not perform this action on this target.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown user or wrong password.
    #[error("authentication failed for {0}")]
    AuthFailed(String),

    /// Path cannot be expressed in the namespace.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// User store failure.
    #[error("user store: {0}")]
    Store(String),

    /// Native error not covered by the kinds above.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GateError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a Conflict error.
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict(path.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create an AuthFailed error.
    pub fn auth_failed(username: impl Into<String>) -> Self {
        Self::AuthFailed(username.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Classify a native error against `path`.
    ///
    /// Kinds with a typed counterpart are mapped onto it; everything else
    /// keeps the original error and message.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::NotADirectory => Self::NotADirectory(path),
            io::ErrorKind::IsADirectory => Self::IsADirectory(path),
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty(path),
            io::ErrorKind::AlreadyExists => Self::Conflict(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io(err),
        }
    }
}

/// Convert GateError to std::io::Error for transports that speak io.
impl From<GateError> for io::Error {
    fn from(e: GateError) -> Self {
        match e {
            GateError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            GateError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            GateError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            GateError::Conflict(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            GateError::NotEmpty(msg) => io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg),
            GateError::PermissionDenied(msg) | GateError::AuthFailed(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            GateError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            GateError::Store(msg) => io::Error::other(msg),
            GateError::Io(e) => e,
        }
    }
}

/// Result type for namespace and access operations.
pub type GateResult<T> = Result<T, GateError>;

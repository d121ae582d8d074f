//! Error types for image loading operations.
//!
//! All load and save failures surface as one of three kinds, mirroring the
//! diagnostics a caller can act on: the file could not be read, the file
//! type is unknown, or the build lacks the third-party support the file
//! needs.

use thiserror::Error;

/// Main error type for image loading and saving.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The image could not be read: missing file, every backend failed on
    /// an otherwise classified file, or a backend failure not caused by
    /// missing format support.
    #[error("image loading error: {0}")]
    Loading(String),

    /// The file suffix is not associated with any known image type.
    #[error("image type error: {0}")]
    UnknownType(String),

    /// The backend responsible for the classified type lacks the support
    /// the file requires (unregistered transfer syntax, unimplemented
    /// encoding).
    #[error("dependency error: {0}")]
    Dependency(String),
}

/// Result type for image loading operations.
pub type Result<T> = std::result::Result<T, LoadError>;

impl LoadError {
    /// Create a loading error.
    pub fn loading(msg: impl Into<String>) -> Self {
        Self::Loading(msg.into())
    }

    /// Create an unknown-type error.
    pub fn unknown_type(msg: impl Into<String>) -> Self {
        Self::UnknownType(msg.into())
    }

    /// Create a dependency error.
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }
}

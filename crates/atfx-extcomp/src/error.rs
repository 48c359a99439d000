//! Error types for the external-component codec.

use std::path::PathBuf;

use atfx_model::{AtfxError, ErrorKind};
use thiserror::Error;

/// Result type for codec operations.
pub type ExtCompResult<T> = std::result::Result<T, ExtCompError>;

/// Errors that can occur while reading or writing external components.
#[derive(Error, Debug)]
pub enum ExtCompError {
    /// Error from the underlying cache.
    #[error("Model error: {0}")]
    Model(#[from] AtfxError),

    /// File access failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed descriptor, value or context parameter.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Value type or representation the codec does not support.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Missing relation, descriptor or attribute.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ExtCompError {
    /// Creates an I/O error with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a bad-parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter(message.into())
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtCompError::Model(e) => e.kind(),
            ExtCompError::Io { .. } => ErrorKind::Io,
            ExtCompError::BadParameter(_) => ErrorKind::BadParameter,
            ExtCompError::NotImplemented(_) => ErrorKind::NotImplemented,
            ExtCompError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

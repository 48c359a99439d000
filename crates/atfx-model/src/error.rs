//! Error types for the schema and instance cache.

use thiserror::Error;

/// Coarse classification shared by every error type of the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown element, attribute, relation, instance or file.
    NotFound,
    /// Element or attribute name collision.
    DuplicateName,
    /// Relation with unbound elements or an unresolved base relation branch.
    InvalidRelation,
    /// Malformed value, out-of-range offset or length.
    BadParameter,
    /// Operator, aggregate or datatype that is not supported.
    NotImplemented,
    /// Underlying file access failure.
    Io,
}

/// Errors raised by [`AtfxCache`](crate::AtfxCache) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtfxError {
    /// An entity could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A name is already in use.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// A relation is not (or not correctly) bound.
    #[error("invalid relation: {0}")]
    InvalidRelation(String),

    /// A parameter was malformed or out of range.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// The requested feature is not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl AtfxError {
    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates a duplicate-name error.
    pub fn duplicate(what: impl Into<String>) -> Self {
        Self::DuplicateName(what.into())
    }

    /// Creates an invalid-relation error.
    pub fn invalid_relation(what: impl Into<String>) -> Self {
        Self::InvalidRelation(what.into())
    }

    /// Creates a bad-parameter error.
    pub fn bad_parameter(what: impl Into<String>) -> Self {
        Self::BadParameter(what.into())
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtfxError::NotFound(_) => ErrorKind::NotFound,
            AtfxError::DuplicateName(_) => ErrorKind::DuplicateName,
            AtfxError::InvalidRelation(_) => ErrorKind::InvalidRelation,
            AtfxError::BadParameter(_) => ErrorKind::BadParameter,
            AtfxError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

/// Result type for cache operations.
pub type AtfxResult<T> = std::result::Result<T, AtfxError>;

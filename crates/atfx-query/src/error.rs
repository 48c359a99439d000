//! Error types for condition evaluation and aggregation.

use atfx_model::{AtfxError, ErrorKind};
use thiserror::Error;

/// Errors that can occur while filtering or aggregating instances.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Error from the underlying cache (unknown element, attribute, ...).
    #[error("Model error: {0}")]
    Model(#[from] AtfxError),

    /// Condition that cannot be evaluated (value shape, relation choice).
    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    /// More than one relation path qualifies between two elements.
    #[error("Ambiguous relation path from '{from}' to '{to}'")]
    AmbiguousRelationPath {
        /// Start element name.
        from: String,
        /// Destination element name.
        to: String,
    },

    /// No relation path of at most two hops exists.
    #[error("No relation path from '{from}' to '{to}'")]
    NoRelationPath {
        /// Start element name.
        from: String,
        /// Destination element name.
        to: String,
    },

    /// Operator or aggregate function that is not implemented.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Result set exceeds the configured limit.
    #[error("Result set too large: {count} exceeds limit {limit}")]
    ResultTooLarge {
        /// Number of results found.
        count: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl QueryError {
    /// Returns the error kind.
    ///
    /// Unsupported and ambiguous conditions are reported as
    /// [`ErrorKind::NotImplemented`], a missing path as
    /// [`ErrorKind::InvalidRelation`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Model(e) => e.kind(),
            QueryError::UnsupportedCondition(_)
            | QueryError::AmbiguousRelationPath { .. }
            | QueryError::NotImplemented(_) => ErrorKind::NotImplemented,
            QueryError::NoRelationPath { .. } => ErrorKind::InvalidRelation,
            QueryError::ResultTooLarge { .. } => ErrorKind::BadParameter,
        }
    }
}

/// Result type for query operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_ambiguous() {
        let err = QueryError::AmbiguousRelationPath {
            from: "Test".to_string(),
            to: "Unit".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous relation path from 'Test' to 'Unit'"
        );
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn test_error_display_result_too_large() {
        let err = QueryError::ResultTooLarge {
            count: 150,
            limit: 100,
        };
        assert_eq!(err.to_string(), "Result set too large: 150 exceeds limit 100");
    }

    #[test]
    fn test_error_from_model_error() {
        let err: QueryError = AtfxError::not_found("application element 9").into();
        assert!(matches!(err, QueryError::Model(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

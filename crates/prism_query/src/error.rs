//! Query executor errors.

use prism_core::CoreError;

/// Query result type
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while fetching rows from a source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Source kind outside the supported set
    #[error("unsupported source kind: {kind}")]
    UnsupportedSourceKind {
        /// The declared kind tag
        kind: String,
    },

    /// Referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind
        kind: String,
        /// Identifier that was looked up
        id: String,
    },

    /// Source config lacks a field its kind needs
    #[error("source '{source_name}' is missing required field '{field}'")]
    MissingField {
        /// Source name
        source_name: String,
        /// Missing config key
        field: String,
    },

    /// No connector registered for this kind
    #[error("no connector configured for {kind} sources")]
    ConnectorUnavailable {
        /// Source kind tag
        kind: String,
    },

    /// The connector itself failed
    #[error("connector error: {0}")]
    Connector(String),

    /// The source answered with something that is not rows
    #[error("invalid response from source '{source_name}': {reason}")]
    InvalidResponse {
        /// Source name
        source_name: String,
        /// What was wrong
        reason: String,
    },
}

impl From<QueryError> for CoreError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnsupportedSourceKind { kind } => CoreError::UnsupportedSourceKind { kind },
            QueryError::NotFound { kind, id } => CoreError::NotFound { kind, id },
            QueryError::MissingField { source_name, field } => CoreError::Validation {
                field: format!("data_source.{}.{}", source_name, field),
                reason: "required field is missing".to_string(),
            },
            other => CoreError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::NotFound {
            kind: "dataset".to_string(),
            id: "sales".to_string(),
        };
        assert_eq!(err.to_string(), "dataset not found: sales");
    }

    #[test]
    fn test_into_core_error() {
        let err: CoreError = QueryError::UnsupportedSourceKind {
            kind: "ftp".to_string(),
        }
        .into();
        assert_eq!(
            err,
            CoreError::UnsupportedSourceKind {
                kind: "ftp".to_string()
            }
        );

        let err: CoreError = QueryError::Connector("boom".to_string()).into();
        assert!(matches!(err, CoreError::Internal { .. }));
    }
}

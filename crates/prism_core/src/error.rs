//! Core error types for Prism.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed definition, raised synchronously to the caller
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Entity not found
    NotFound {
        /// Entity kind
        kind: String,
        /// Entity identifier
        id: String,
    },

    /// Data source kind outside the supported set
    UnsupportedSourceKind {
        /// The declared kind
        kind: String,
    },

    /// Invalid ID format
    InvalidId {
        /// Why parsing failed
        reason: String,
    },

    /// Invalid encoding
    InvalidEncoding {
        /// Decoder message
        reason: String,
    },

    /// Persistence failure
    Storage {
        /// Error message
        message: String,
    },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl CoreError {
    /// Shorthand for a validation error
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a not-found error
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::UnsupportedSourceKind { kind } => {
                write!(f, "Unsupported source kind: {}", kind)
            }
            Self::InvalidId { reason } => write!(f, "Invalid ID: {}", reason),
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
            Self::Storage { message } => write!(f, "Storage error: {}", message),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::not_found("Report", "rpt_123");
        assert_eq!(format!("{}", err), "Report not found: rpt_123");

        let err = CoreError::validation("data_sources", "at least one source is required");
        assert_eq!(
            err.to_string(),
            "Validation failed for data_sources: at least one source is required"
        );
    }

    #[test]
    fn test_unsupported_kind_display() {
        let err = CoreError::UnsupportedSourceKind {
            kind: "ftp".to_string(),
        };
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::validation("a", "b");
        let err2 = CoreError::validation("a", "b");
        assert_eq!(err1, err2);
        assert_ne!(err1, CoreError::not_found("a", "b"));
    }
}

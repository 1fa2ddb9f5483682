//! Alert errors.

use prism_core::CoreError;
use prism_query::QueryError;
use prism_storage::StorageError;

/// Alert result type
pub type AlertResult<T> = Result<T, AlertError>;

/// Errors raised by the evaluator
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Malformed rule or invalid instance transition
    #[error("{0}")]
    Validation(CoreError),

    /// Referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind
        kind: String,
        /// Entity id
        id: String,
    },

    /// The metric query failed
    #[error("metric query failed: {0}")]
    Query(#[from] QueryError),

    /// The metric query returned nothing numeric
    #[error("no metric value for rule '{rule}'")]
    NoMetric {
        /// Rule name
        rule: String,
    },

    /// Repository failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AlertError {
    /// Shorthand for a missing entity
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

impl From<CoreError> for AlertError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Validation(other),
        }
    }
}

/// Notification result type
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised delivering one notification to one channel
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("{url} answered {status}")]
    Status {
        /// Endpoint URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Email transport failure
    #[error("email delivery failed: {0}")]
    Email(String),

    /// Channel has nothing to deliver to
    #[error("channel '{kind}' is not deliverable: {reason}")]
    Undeliverable {
        /// Channel kind
        kind: String,
        /// Why
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err: AlertError = CoreError::not_found("alert_rule", "rule_1").into();
        assert!(matches!(err, AlertError::NotFound { .. }));
        assert_eq!(err.to_string(), "alert_rule not found: rule_1");

        let err: AlertError = CoreError::validation("name", "must not be empty").into();
        assert!(matches!(err, AlertError::Validation(_)));
    }

    #[test]
    fn test_status_display() {
        let err = NotifyError::Status {
            url: "https://hooks.example.com/x".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://hooks.example.com/x answered 503");
    }
}

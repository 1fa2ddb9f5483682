//! Engine errors.
//!
//! Only validation and lookup failures reach the caller of a trigger.
//! Query, render, and internal failures of a running execution are recorded
//! on the execution instead.

use prism_core::CoreError;
use prism_query::QueryError;
use prism_render::RenderError;
use prism_storage::StorageError;

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed definition or invalid state transition
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

    /// Repository failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Query stage failure
    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    /// Render stage failure
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Any other failure inside a running execution, including panics
    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    /// The background task could not be joined
    #[error("background task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Shorthand for a missing entity
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Validation(other),
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(inner) => inner,
            EngineError::NotFound { kind, id } => CoreError::NotFound { kind, id },
            EngineError::Storage(inner) => inner.into(),
            EngineError::Query(inner) => inner.into(),
            EngineError::Render(inner) => inner.into(),
            other => CoreError::Internal {
                message: other.to_string(),
            },
        }
    }
}

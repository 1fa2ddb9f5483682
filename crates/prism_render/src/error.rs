//! Render and artifact store errors.

use prism_core::CoreError;

/// Render result type
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while encoding or storing artifacts
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No artifact stored under this name
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Artifact names are flat file names
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
}

impl From<RenderError> for CoreError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NotFound(name) => CoreError::NotFound {
                kind: "artifact".to_string(),
                id: name,
            },
            other => CoreError::Storage {
                message: other.to_string(),
            },
        }
    }
}

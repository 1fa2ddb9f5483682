//! Storage errors.

use prism_core::CoreError;

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a repository backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// redb failure
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    /// Stored bytes do not decode, or an entity does not encode
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking storage task did not complete
    #[error("storage task failed: {0}")]
    Task(String),
}

macro_rules! redb_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    Self::Database(err.into())
                }
            }
        )*
    };
}

redb_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

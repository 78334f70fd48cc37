//! Error types for session storage.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by session storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failures from the durable store.
    #[error("io error at {path}: {error}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        error: String,
    },

    /// The backing file is not a valid JSON map.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("storage lock error: {0}")]
    Lock(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

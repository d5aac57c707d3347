use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying technology.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the store was doing.
        message: String,
        /// Backend failure, when there is one.
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// A write would move a game back to an older version.
    #[error("game {id} is stored at version {stored}, refusing to write version {attempted}")]
    VersionConflict {
        /// Game being written.
        id: Uuid,
        /// Version currently stored.
        stored: u64,
        /// Version of the rejected write.
        attempted: u64,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Construct an unavailable error without an underlying cause.
    pub fn offline(message: impl Into<String>) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: None,
        }
    }
}

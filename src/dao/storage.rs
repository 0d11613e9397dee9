use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("document `{path}` not found")]
    NotFound { path: String },
    #[error("version conflict on `{path}` (expected {expected}, found {actual})")]
    Conflict {
        path: String,
        expected: u64,
        actual: u64,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error for a game document.
    pub fn game_not_found(game_id: &str) -> Self {
        StorageError::NotFound {
            path: format!("games/{game_id}"),
        }
    }

    /// Construct a not-found error for a player document.
    pub fn player_not_found(game_id: &str, player_id: &str) -> Self {
        StorageError::NotFound {
            path: format!("games/{game_id}/players/{player_id}"),
        }
    }
}

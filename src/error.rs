use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{game::TimingError, roles::RoleError, state_machine::InvalidTransition},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed to read or write.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Requested game or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The roster is too small to start.
    #[error("not enough players to start (got {got})")]
    InsufficientPlayers { got: usize },
    /// The game mode has no controller.
    #[error("game mode {0} is not supported")]
    UnsupportedGameMode(String),
    /// Lobby settings cannot produce a playable game.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// Operation cannot be performed in the current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Another writer updated the game first.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { path } => ServiceError::NotFound(path),
            conflict @ StorageError::Conflict { .. } => ServiceError::Conflict(conflict.to_string()),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<RoleError> for ServiceError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::InsufficientPlayers { got } => ServiceError::InsufficientPlayers { got },
            other => ServiceError::InvalidSettings(other.to_string()),
        }
    }
}

impl From<TimingError> for ServiceError {
    fn from(err: TimingError) -> Self {
        ServiceError::InvalidSettings(err.to_string())
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::NotFound(_) => AppError::NotFound(message),
            ServiceError::UnsupportedGameMode(_) => AppError::BadRequest(message),
            ServiceError::InsufficientPlayers { .. }
            | ServiceError::InvalidSettings(_)
            | ServiceError::InvalidState(_)
            | ServiceError::Conflict(_) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            success: false,
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

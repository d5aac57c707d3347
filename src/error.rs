use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{catalog::CatalogError, storage::StorageError},
    state::{game::TurnRevision, reducer::ApplyError, state_machine::InvalidTransition},
};

/// Business-rule rejections. None of them leaves a partially mutated game behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Malformed input rejected before touching state.
    #[error("invalid input: {0}")]
    Validation(String),
    /// The turn's track changed since the caller last looked at it.
    #[error("stale revision: turn is at revision {expected}, request carried {got}")]
    StaleRevision {
        /// Current revision of the turn.
        expected: TurnRevision,
        /// Revision the request carried.
        got: TurnRevision,
    },
    /// The player cannot afford the action.
    #[error("insufficient tokens: {required} required, {available} available")]
    InsufficientTokens {
        /// Price of the action.
        required: u32,
        /// Current balance.
        available: u32,
    },
    /// The guessed position lies outside the active player's timeline.
    #[error("invalid position {position}: expected 0..={max}")]
    InvalidPosition {
        /// Requested position.
        position: usize,
        /// Highest valid position.
        max: usize,
    },
    /// The player already made this kind of guess on the turn.
    #[error("this aspect was already guessed this turn")]
    AlreadyGuessed,
    /// The player passed and can no longer act on the turn.
    #[error("player already passed this turn")]
    AlreadyPassed,
    /// Each player votes once per proposal.
    #[error("player already voted on this proposal")]
    AlreadyVoted,
    /// No turn currently accepts guesses.
    #[error("turn is not accepting guesses")]
    InactiveTurn,
    /// The operation does not fit the current lifecycle state.
    #[error("unexpected state: {0}")]
    UnexpectedState(String),
    /// The phase machine refused the transition.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Reserved to the game master.
    #[error("only the game master may do this")]
    NotGameMaster,
    /// The game master has to abort instead.
    #[error("the game master cannot leave the game")]
    GameMasterCannotLeave,
    /// Unknown game or player.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A game rule rejected the operation.
    #[error(transparent)]
    Game(#[from] GameError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The track catalog could not provide a track, even after retrying.
    #[error("track catalog unavailable")]
    Catalog(#[source] CatalogError),
    /// An event could not be applied to the authoritative game.
    #[error("event rejected by reducer: {0}")]
    Apply(#[from] ApplyError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        ServiceError::Catalog(err)
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
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller identity missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is known but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Well-formed request that the game rules refuse.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::Validation(_) => AppError::BadRequest(message),
            GameError::NotFound(_) => AppError::NotFound(message),
            GameError::NotGameMaster | GameError::GameMasterCannotLeave => {
                AppError::Forbidden(message)
            }
            GameError::InsufficientTokens { .. } | GameError::InvalidPosition { .. } => {
                AppError::Unprocessable(message)
            }
            GameError::StaleRevision { .. }
            | GameError::AlreadyGuessed
            | GameError::AlreadyPassed
            | GameError::AlreadyVoted
            | GameError::InactiveTurn
            | GameError::UnexpectedState(_)
            | GameError::InvalidTransition(_) => AppError::Conflict(message),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Game(game) => game.into(),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Catalog(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Apply(source) => AppError::Internal(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

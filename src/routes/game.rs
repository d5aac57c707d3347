use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{CommandResponse, CreateGameRequest},
    error::AppError,
    routes::session::SessionUser,
    services::game_service,
    state::{SharedState, game::Game},
};

/// Routes handling the game lobby and lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/leave", post(leave_game))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/abort", post(abort_game))
}

/// Open a new lobby; the caller becomes its game master.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    params(("x-user-id" = String, Header, description = "Calling player")),
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = Game),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<Game>, AppError> {
    let game = game_service::create_game(&state, &user_id, payload).await?;
    Ok(Json(game))
}

/// Authoritative snapshot of a game.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Current game state", body = Game),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Game>, AppError> {
    let game = game_service::get_game(&state, id).await?;
    Ok(Json(game))
}

/// Join a game waiting for players.
#[utoipa::path(
    post,
    path = "/games/{id}/join",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    responses((status = 200, description = "Player joined", body = CommandResponse))
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<CommandResponse>, AppError> {
    let events = game_service::join_game(&state, id, &user_id).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

/// Leave a game. The game master cannot leave.
#[utoipa::path(
    post,
    path = "/games/{id}/leave",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Player left", body = CommandResponse),
        (status = 403, description = "The game master cannot leave")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<CommandResponse>, AppError> {
    let events = game_service::leave_game(&state, id, &user_id).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

/// Deal the initial timelines and open the first turn.
#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Game master")
    ),
    responses((status = 200, description = "Game started", body = CommandResponse))
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<CommandResponse>, AppError> {
    let events = game_service::start_game(&state, id, &user_id).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

/// Stop the game for good.
#[utoipa::path(
    post,
    path = "/games/{id}/abort",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Game master")
    ),
    responses((status = 200, description = "Game aborted", body = CommandResponse))
)]
pub async fn abort_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<CommandResponse>, AppError> {
    let events = game_service::abort_game(&state, id, &user_id).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

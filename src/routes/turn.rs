use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        CommandResponse, CorrectionRequest, CorrectionVoteRequest, CreditsGuessRequest,
        ReleaseYearGuessRequest, RevisionRequest,
    },
    error::AppError,
    routes::session::SessionUser,
    services::{correction_service, turn_service},
    state::SharedState,
};

/// Routes acting on the current turn of a running game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/turn/release-year-guess", post(guess_release_year))
        .route("/games/{id}/turn/credits-guess", post(guess_credits))
        .route("/games/{id}/turn/pass", post(pass_turn))
        .route("/games/{id}/turn/exchange", post(exchange_track))
        .route("/games/{id}/turn/buy", post(buy_track))
        .route("/games/{id}/turn/complete", post(complete_turn))
        .route("/games/{id}/turn/correction", post(propose_correction))
        .route("/games/{id}/turn/correction/vote", post(vote_correction))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/release-year-guess",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    request_body = ReleaseYearGuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = CommandResponse),
        (status = 409, description = "Stale revision, duplicate guess or closed turn"),
        (status = 422, description = "Invalid position or not enough tokens")
    )
)]
/// Place the track in the active player's timeline, optionally dating it.
pub async fn guess_release_year(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<ReleaseYearGuessRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::guess_release_year(&state, id, &user_id, payload).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/credits-guess",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    request_body = CreditsGuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = CommandResponse),
        (status = 409, description = "Stale revision, duplicate guess or closed turn")
    )
)]
/// Guess the artists and title of the track.
pub async fn guess_credits(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<CreditsGuessRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::guess_credits(&state, id, &user_id, payload).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/pass",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    request_body = RevisionRequest,
    responses((status = 200, description = "Pass recorded", body = CommandResponse))
)]
/// Stop guessing for this turn.
pub async fn pass_turn(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<RevisionRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::pass_turn(&state, id, &user_id, payload.revision).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/exchange",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Active player")
    ),
    request_body = RevisionRequest,
    responses((status = 200, description = "Track exchanged", body = CommandResponse))
)]
/// Swap the current track for a fresh one.
pub async fn exchange_track(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<RevisionRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::exchange_track(&state, id, &user_id, payload.revision).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/buy",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Active player")
    ),
    request_body = RevisionRequest,
    responses((status = 200, description = "Track bought", body = CommandResponse))
)]
/// Buy the current track into the caller's timeline.
pub async fn buy_track(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<RevisionRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::buy_track(&state, id, &user_id, payload.revision).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/complete",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    responses((status = 200, description = "Completion recorded", body = CommandResponse))
)]
/// Acknowledge the scored turn.
pub async fn complete_turn(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<CommandResponse>, AppError> {
    let events = turn_service::complete_turn(&state, id, &user_id).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/correction",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    request_body = CorrectionRequest,
    responses((status = 200, description = "Vote opened", body = CommandResponse))
)]
/// Propose another release year for the current track.
pub async fn propose_correction(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<CorrectionRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = correction_service::propose_correction(&state, id, &user_id, payload).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/turn/correction/vote",
    tag = "turn",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-user-id" = String, Header, description = "Calling player")
    ),
    request_body = CorrectionVoteRequest,
    responses((status = 200, description = "Vote recorded", body = CommandResponse))
)]
/// Vote on the open correction proposal.
pub async fn vote_correction(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    SessionUser(user_id): SessionUser,
    Valid(Json(payload)): Valid<Json<CorrectionVoteRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    let events = correction_service::vote_correction(&state, id, &user_id, payload).await?;
    Ok(Json(CommandResponse::new(id, events)))
}

use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document.
pub mod docs;
/// Lobby and lifecycle endpoints.
pub mod game;
/// Health endpoint.
pub mod health;
/// Caller identity extraction.
pub mod session;
/// Event stream endpoint.
pub mod sse;
/// Turn and correction endpoints.
pub mod turn;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(game::router())
        .merge(turn::router())
        .merge(docs::router())
        .with_state(state)
}

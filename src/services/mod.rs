use tracing::{debug, info};
use uuid::Uuid;

use crate::{error::ServiceError, state::events::EventEnvelope};

/// Correction proposals, votes and rescoring.
pub mod correction_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Lobby and lifecycle commands.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Backoff for collaborator calls.
pub mod retry;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscription service.
pub mod sse_service;
/// Guess, pass, exchange, purchase and completion commands plus turn triggers.
pub mod turn_service;

/// Log the outcome of a command: accepted ones at info with the events they
/// produced, rejected ones at debug.
fn logged(
    operation: &'static str,
    game_id: Uuid,
    user_id: &str,
    result: Result<Vec<EventEnvelope>, ServiceError>,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    match &result {
        Ok(envelopes) => {
            let events: Vec<&str> = envelopes
                .iter()
                .map(|envelope| envelope.event.event_type())
                .collect();
            info!(operation, %game_id, user_id, ?events, "command applied");
        }
        Err(err) => debug!(operation, %game_id, user_id, error = %err, "command rejected"),
    }
    result
}

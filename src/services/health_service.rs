use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Check the game store and count the games served by this process.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let status = match state.store().health_check().await {
        Ok(()) => HealthStatus::Ok,
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthStatus::Degraded
        }
    };
    HealthResponse::new(status, state.live_games())
}

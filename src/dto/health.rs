use serde::Serialize;
use utoipa::ToSchema;

/// Whether the storage collaborator answered the last health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage answered.
    Ok,
    /// Commands are rejected until storage comes back; live games stay readable.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Storage health.
    pub status: HealthStatus,
    /// Games currently held in memory by this process.
    pub live_games: usize,
}

impl HealthResponse {
    /// Build the response body.
    pub fn new(status: HealthStatus, live_games: usize) -> Self {
        Self { status, live_games }
    }

    /// Whether the process can serve commands.
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

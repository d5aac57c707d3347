use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed messages use the default `message` type.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
/// First message sent on a game's event stream.
///
/// Events are delivered at most once and never replayed: after receiving this
/// handshake a client fetches `GET /games/{id}` and treats that snapshot as
/// authoritative, ignoring events whose version it already has.
pub struct Handshake {
    /// Game the stream follows.
    pub game_id: Uuid,
    /// Game version when the subscription was opened.
    pub version: u64,
    /// Lower bound of the client reconnect backoff, in milliseconds.
    pub min_retry_ms: u64,
    /// Upper bound of the client reconnect backoff, in milliseconds.
    pub max_retry_ms: u64,
}

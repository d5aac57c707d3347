/// Game and turn command payloads.
pub mod game;
/// Health check payload.
pub mod health;
/// Event stream wire payloads.
pub mod sse;
/// Shared field validators.
pub mod validation;

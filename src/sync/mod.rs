//! Client side of the game event stream.
//!
//! Events are pushed best-effort: a subscriber may miss some while it is
//! disconnected or lagging. Clients therefore never try to replay what they
//! missed; they keep a [`GameMirror`] that applies envelopes through the same
//! reducer as the server, and fall back to a fresh snapshot whenever the
//! version sequence shows a hole.

/// Reconnection delays.
pub mod backoff;
/// Stream-following client.
pub mod client;
/// Local copy of a game kept current from events.
pub mod mirror;

use thiserror::Error;

use crate::{error::ServiceError, state::reducer::ApplyError};

pub use self::{
    backoff::ReconnectBackoff,
    client::{GameSyncClient, LocalTransport, SyncTransport},
    mirror::{GameMirror, Receipt},
};

/// Failures of a synchronising client.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend refused or failed a subscription or snapshot request.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// An event payload could not be decoded.
    #[error("undecodable event payload")]
    Decode(#[from] serde_json::Error),
    /// The mirror refused an event even after resynchronising.
    #[error("mirror diverged from the server")]
    Diverged(#[from] ApplyError),
    /// The snapshot belongs to another game.
    #[error("snapshot of game `{got}` received while following `{expected}`")]
    ForeignSnapshot {
        /// Game the client follows.
        expected: uuid::Uuid,
        /// Game the snapshot belongs to.
        got: uuid::Uuid,
    },
    /// The event stream ended; the client has to reconnect.
    #[error("event stream closed")]
    StreamClosed,
}

use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Fan-out of one game's events to its stream subscribers.
///
/// Nothing is retained for subscribers that connect later; a subscriber that
/// falls more than `capacity` events behind loses the oldest ones.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Queue `event` for every current subscriber and return how many there
    /// were. Nobody listening is not an error.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

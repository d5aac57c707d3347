use tracing::{debug, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::{SseHub, events::EventEnvelope},
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Broadcast one applied event to every subscriber of its game.
///
/// The SSE event name is the event's wire type and the data is the whole
/// envelope, so subscribers can order events by `version`.
pub fn publish(hub: &SseHub, envelope: &EventEnvelope) {
    let event = envelope.event.event_type();
    match ServerEvent::json(Some(event.to_string()), envelope) {
        Ok(payload) => {
            let receivers = hub.broadcast(payload);
            debug!(
                game_id = %envelope.game_id,
                version = envelope.version,
                event,
                receivers,
                "published game event"
            );
        }
        Err(err) => warn!(
            game_id = %envelope.game_id,
            event,
            error = %err,
            "failed to serialize game event payload"
        ),
    }
}

/// Build the first message of a fresh subscription.
pub fn handshake_event(handshake: &Handshake) -> Option<ServerEvent> {
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), handshake) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(game_id = %handshake.game_id, error = %err, "failed to serialize SSE handshake");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::events::GameEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn envelope_is_published_under_its_event_type() {
        let hub = SseHub::new(4);
        let mut receiver = hub.subscribe();
        let envelope = EventEnvelope {
            game_id: Uuid::new_v4(),
            version: 7,
            event: GameEvent::TurnCompleted {
                turn_index: 2,
                user_id: "bob".into(),
            },
        };

        publish(&hub, &envelope);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event.as_deref(), Some("turn_completed"));
        let back: EventEnvelope = serde_json::from_str(&received.data).unwrap();
        assert_eq!(back, envelope);
    }
}

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Subscribe to a game's events.
///
/// The receiver is registered under the game lock, so the handshake version
/// is exactly the last version this subscriber will not receive.
pub async fn subscribe(
    state: &SharedState,
    game_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Handshake), ServiceError> {
    let handle = state.game(game_id).await?;
    let slot = handle.lock().await;
    let receiver = handle.sse().subscribe();
    let sync = state.config().sync;
    let handshake = Handshake {
        game_id,
        version: slot.game.version,
        min_retry_ms: sync.min_retry_ms,
        max_retry_ms: u64::try_from(sync.max_retry().as_millis()).unwrap_or(u64::MAX),
    };
    Ok((receiver, handshake))
}

/// Handshake followed by every event broadcast to `receiver`.
///
/// The stream ends when the game's hub goes away or when the subscriber fell
/// behind the broadcast buffer: a lagging client has lost events and must
/// reconnect and resynchronise from a snapshot.
pub fn event_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: Handshake,
) -> impl Stream<Item = ServerEvent> + Send + 'static {
    stream! {
        if let Some(event) = sse_events::handshake_event(&handshake) {
            yield event;
        }
        loop {
            match receiver.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    info!(game_id = %handshake.game_id, skipped, "SSE subscriber lagged; closing stream");
                    break;
                }
            }
        }
    }
}

/// Convert a game event stream into an SSE response, forwarding events and
/// logging once the client disconnects.
pub fn to_sse_stream(
    events: impl Stream<Item = ServerEvent> + Send + 'static,
    game_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut events = Box::pin(events);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = events.next() => {
                    let Some(payload) = next else { break };
                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(%game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

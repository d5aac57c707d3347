use std::future::Future;

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::SyncConfig,
    dto::sse::ServerEvent,
    services::{game_service, sse_service},
    state::{SharedState, events::EventEnvelope, game::Game},
    sync::{GameMirror, Receipt, ReconnectBackoff, SyncError},
};

/// SSE event name of the first message of every stream.
const HANDSHAKE_EVENT: &str = "handshake";

/// Where a [`GameSyncClient`] gets its events and snapshots from.
pub trait SyncTransport: Send + Sync {
    /// Open the game's event stream.
    fn subscribe(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ServerEvent>, SyncError>>;

    /// Fetch the authoritative state of the game.
    fn snapshot(&self, game_id: Uuid) -> BoxFuture<'_, Result<Game, SyncError>>;
}

/// Transport talking to the services of this process directly.
#[derive(Clone)]
pub struct LocalTransport {
    state: SharedState,
}

impl LocalTransport {
    /// Transport talking to the services of this process.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl SyncTransport for LocalTransport {
    fn subscribe(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ServerEvent>, SyncError>> {
        async move {
            let (receiver, handshake) = sse_service::subscribe(&self.state, game_id).await?;
            Ok(sse_service::event_stream(receiver, handshake).boxed())
        }
        .boxed()
    }

    fn snapshot(&self, game_id: Uuid) -> BoxFuture<'_, Result<Game, SyncError>> {
        async move { Ok(game_service::get_game(&self.state, game_id).await?) }.boxed()
    }
}

/// Follows one game: keeps a [`GameMirror`] current from the event stream
/// and resynchronises from a snapshot whenever the stream drops or skips
/// versions.
pub struct GameSyncClient<T> {
    transport: T,
    game_id: Uuid,
    mirror: GameMirror,
    backoff: ReconnectBackoff,
    events: Option<BoxStream<'static, ServerEvent>>,
}

impl<T: SyncTransport> GameSyncClient<T> {
    /// Subscribe to the game, then load its snapshot.
    ///
    /// Subscribing first means nothing published in between is lost; events
    /// already contained in the snapshot are later dropped as duplicates.
    pub async fn connect(transport: T, game_id: Uuid, config: &SyncConfig) -> Result<Self, SyncError> {
        let events = transport.subscribe(game_id).await?;
        let snapshot = transport.snapshot(game_id).await?;
        check_snapshot(game_id, &snapshot)?;
        info!(%game_id, version = snapshot.version, "sync client connected");

        Ok(Self {
            transport,
            game_id,
            mirror: GameMirror::new(snapshot),
            backoff: ReconnectBackoff::new(config),
            events: Some(events),
        })
    }

    /// Last state confirmed by the server.
    pub fn game(&self) -> &Game {
        self.mirror.game()
    }

    /// The local copy, optimistic predictions included.
    pub fn mirror(&self) -> &GameMirror {
        &self.mirror
    }

    /// Whether an event stream is currently open.
    pub fn is_connected(&self) -> bool {
        self.events.is_some()
    }

    /// Process one message of the event stream.
    ///
    /// Returns `None` for messages that carry no game event (the handshake).
    pub async fn handle(&mut self, message: ServerEvent) -> Result<Option<Receipt>, SyncError> {
        if message.event.as_deref() == Some(HANDSHAKE_EVENT) {
            return Ok(None);
        }

        let envelope: EventEnvelope = serde_json::from_str(&message.data)?;
        let receipt = match self.mirror.receive(&envelope) {
            Ok(Receipt::Gap { expected, got }) => {
                info!(game_id = %self.game_id, expected, got, "missed events; resynchronising");
                self.resync().await?;
                Receipt::Gap { expected, got }
            }
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(game_id = %self.game_id, version = envelope.version, error = %err, "event did not apply; resynchronising");
                self.resync().await?;
                self.mirror.receive(&envelope)?
            }
        };
        debug!(game_id = %self.game_id, version = envelope.version, ?receipt, "event received");
        Ok(Some(receipt))
    }

    /// Handle every message already waiting on the stream without blocking.
    ///
    /// Returns the number of messages processed, or
    /// [`SyncError::StreamClosed`] once the stream has ended.
    pub async fn drain(&mut self) -> Result<usize, SyncError> {
        let mut handled = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return Err(SyncError::StreamClosed);
            };
            match events.next().now_or_never() {
                None => return Ok(handled),
                Some(None) => {
                    self.events = None;
                    return Err(SyncError::StreamClosed);
                }
                Some(Some(message)) => {
                    self.handle(message).await?;
                    handled += 1;
                }
            }
        }
    }

    /// Open a new stream and replace local state with a fresh snapshot.
    pub async fn reconnect(&mut self) -> Result<(), SyncError> {
        self.events = None;
        let events = self.transport.subscribe(self.game_id).await?;
        self.events = Some(events);
        self.resync().await?;
        self.backoff.reset();
        info!(game_id = %self.game_id, version = self.mirror.game().version, "sync client reconnected");
        Ok(())
    }

    /// Follow the game until `shutdown` resolves or the game is over,
    /// reconnecting with backoff whenever the stream ends or a reconnection
    /// fails.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Self {
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            if self.mirror.game().state.is_terminal() {
                info!(game_id = %self.game_id, phase = ?self.mirror.game().state, "game over; sync client stopping");
                break;
            }
            if self.events.is_none() {
                let delay = self.backoff.next_delay();
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = sleep(delay) => {}
                }
                if let Err(err) = self.reconnect().await {
                    warn!(game_id = %self.game_id, error = %err, "reconnection failed");
                    self.events = None;
                }
                continue;
            }
            let Some(events) = self.events.as_mut() else {
                continue;
            };

            tokio::select! {
                _ = &mut shutdown => break,
                next = events.next() => match next {
                    Some(message) => {
                        if let Err(err) = self.handle(message).await {
                            warn!(game_id = %self.game_id, error = %err, "dropping event stream");
                            self.events = None;
                        }
                    }
                    None => {
                        info!(game_id = %self.game_id, "event stream ended");
                        self.events = None;
                    }
                },
            }
        }
        self
    }

    async fn resync(&mut self) -> Result<(), SyncError> {
        let snapshot = self.transport.snapshot(self.game_id).await?;
        check_snapshot(self.game_id, &snapshot)?;
        self.mirror.resync(snapshot);
        Ok(())
    }
}

fn check_snapshot(expected: Uuid, snapshot: &Game) -> Result<(), SyncError> {
    if snapshot.id == expected {
        Ok(())
    } else {
        Err(SyncError::ForeignSnapshot {
            expected,
            got: snapshot.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::{
        dto::game::{CreateGameRequest, ReleaseYearGuessRequest},
        services::{game_service, turn_service},
        state::{game::TurnRevision, state_machine::GamePhase},
        test_support::test_state,
    };

    fn quick_sync() -> SyncConfig {
        SyncConfig {
            min_retry_ms: 5,
            max_retry_ms: 20,
        }
    }

    /// Local transport whose first `drops` subscriptions end right after the
    /// handshake, like a connection that keeps breaking.
    struct FlakyTransport {
        inner: LocalTransport,
        drops: AtomicUsize,
    }

    impl SyncTransport for FlakyTransport {
        fn subscribe(
            &self,
            game_id: Uuid,
        ) -> BoxFuture<'_, Result<BoxStream<'static, ServerEvent>, SyncError>> {
            async move {
                let events = self.inner.subscribe(game_id).await?;
                let dropped = self
                    .drops
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                Ok(if dropped { events.take(1).boxed() } else { events })
            }
            .boxed()
        }

        fn snapshot(&self, game_id: Uuid) -> BoxFuture<'_, Result<Game, SyncError>> {
            self.inner.snapshot(game_id)
        }
    }

    fn bytes(game: &Game) -> Vec<u8> {
        serde_json::to_vec(game).unwrap()
    }

    async fn lobby(state: &SharedState) -> Uuid {
        let game = game_service::create_game(state, "alice", CreateGameRequest::default())
            .await
            .unwrap();
        game_service::join_game(state, game.id, "bob").await.unwrap();
        game.id
    }

    #[tokio::test]
    async fn reconnecting_client_converges_on_the_server_state() {
        let state = test_state();
        let game_id = lobby(&state).await;

        let mut steady = GameSyncClient::connect(LocalTransport::new(state.clone()), game_id, &quick_sync())
            .await
            .unwrap();
        let flaky = FlakyTransport {
            inner: LocalTransport::new(state.clone()),
            drops: AtomicUsize::new(1),
        };
        let mut flaky = GameSyncClient::connect(flaky, game_id, &quick_sync())
            .await
            .unwrap();
        assert_eq!(flaky.game().version, 1);

        game_service::join_game(&state, game_id, "carol").await.unwrap();
        game_service::start_game(&state, game_id, "alice").await.unwrap();

        // handshake + player_joined + game_started + new_turn
        assert_eq!(steady.drain().await.unwrap(), 4);
        assert!(matches!(flaky.drain().await, Err(SyncError::StreamClosed)));
        assert_eq!(flaky.game().version, 1);
        assert!(!flaky.is_connected());

        flaky.reconnect().await.unwrap();
        let server = game_service::get_game(&state, game_id).await.unwrap();
        assert_eq!(server.version, 4);
        assert_eq!(bytes(flaky.game()), bytes(&server));
        assert_eq!(bytes(steady.game()), bytes(&server));

        turn_service::guess_release_year(
            &state,
            game_id,
            "bob",
            ReleaseYearGuessRequest {
                revision: TurnRevision::initial(),
                position: 0,
                year: None,
            },
        )
        .await
        .unwrap();
        steady.drain().await.unwrap();
        flaky.drain().await.unwrap();

        let server = game_service::get_game(&state, game_id).await.unwrap();
        assert_eq!(bytes(flaky.game()), bytes(&server));
        assert_eq!(bytes(steady.game()), bytes(&server));
    }

    #[tokio::test]
    async fn gap_in_versions_triggers_a_snapshot() {
        let state = test_state();
        let game_id = lobby(&state).await;
        let mut client = GameSyncClient::connect(LocalTransport::new(state.clone()), game_id, &quick_sync())
            .await
            .unwrap();

        game_service::join_game(&state, game_id, "carol").await.unwrap();
        let server = game_service::get_game(&state, game_id).await.unwrap();
        let message = ServerEvent::json(
            Some("player_joined".to_string()),
            &EventEnvelope {
                game_id,
                version: server.version + 5,
                event: crate::state::events::GameEvent::GameAborted {
                    aborted_at: std::time::SystemTime::UNIX_EPOCH,
                },
            },
        )
        .unwrap();

        let receipt = client.handle(message).await.unwrap();
        assert!(matches!(receipt, Some(Receipt::Gap { .. })));
        assert_eq!(bytes(client.game()), bytes(&server));
        assert!(!client.mirror().is_stale());
    }

    #[tokio::test]
    async fn run_reconnects_until_shutdown() {
        let state = test_state();
        let game_id = lobby(&state).await;
        let transport = FlakyTransport {
            inner: LocalTransport::new(state.clone()),
            drops: AtomicUsize::new(3),
        };
        let client = GameSyncClient::connect(transport, game_id, &quick_sync())
            .await
            .unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(client.run(async move {
            let _ = stopped.await;
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        game_service::join_game(&state, game_id, "carol").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(()).unwrap();

        let client = running.await.unwrap();
        assert!(client.is_connected());
        let server = game_service::get_game(&state, game_id).await.unwrap();
        assert_eq!(bytes(client.game()), bytes(&server));
        assert_eq!(client.transport.drops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_stops_once_the_game_is_over() {
        let state = test_state();
        let game_id = lobby(&state).await;
        let client = GameSyncClient::connect(LocalTransport::new(state.clone()), game_id, &quick_sync())
            .await
            .unwrap();
        let running = tokio::spawn(client.run(std::future::pending::<()>()));

        game_service::abort_game(&state, game_id, "alice").await.unwrap();

        let client = tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.game().state, GamePhase::Aborted);
        assert_eq!(state.live_games(), 0);
    }

    #[tokio::test]
    async fn snapshot_of_unknown_game_fails_to_connect() {
        let state = test_state();
        let result =
            GameSyncClient::connect(LocalTransport::new(state), Uuid::new_v4(), &quick_sync()).await;
        assert!(matches!(result, Err(SyncError::Service(_))));
    }
}

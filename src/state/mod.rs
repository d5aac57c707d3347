/// Events every game change goes through.
pub mod events;
/// Game aggregate and its parts.
pub mod game;
/// Applies events to a game.
pub mod reducer;
mod sse;
/// Game phases and their transitions.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{AppConfig, RuleConstants},
    dao::{catalog::TrackCatalog, game_store::GameStore, models::GameEntity},
    error::{GameError, ServiceError},
    services::{retry::RetryPolicy, sse_events},
    state::{
        events::{EventEnvelope, GameEvent},
        game::{Game, TurnRevision},
        reducer::ApplyError,
    },
};

pub use self::sse::SseHub;

/// State shared by every handler and background task.
pub type SharedState = Arc<AppState>;

/// Buffered events per game before slow SSE subscribers start lagging.
const SSE_CAPACITY: usize = 64;

/// Central application state: collaborators plus one handle per live game.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn GameStore>,
    catalog: Arc<dyn TrackCatalog>,
    retry: RetryPolicy,
    games: DashMap<Uuid, Arc<GameHandle>>,
}

/// Everything the process keeps for one game: the lock-guarded aggregate and
/// its broadcast hub.
pub struct GameHandle {
    slot: Mutex<GameSlot>,
    sse: SseHub,
}

/// Authoritative game plus the pending scoring countdown, guarded together so
/// the countdown can never outlive the turn it was armed for.
pub struct GameSlot {
    /// Authoritative game.
    pub game: Game,
    pub(crate) scoring_timer: Option<ScoringTimer>,
}

/// Countdown armed once the active player passed.
pub(crate) struct ScoringTimer {
    pub turn_index: usize,
    pub revision: TurnRevision,
    pub handle: JoinHandle<()>,
}

impl ScoringTimer {
    /// Whether the countdown belongs to this turn and track.
    pub fn targets(&self, turn_index: usize, revision: TurnRevision) -> bool {
        self.turn_index == turn_index && self.revision == revision
    }
}

/// Working copy of a game accumulating events. Nothing is visible to other
/// callers until [`AppState::commit`] succeeds.
pub struct Draft {
    game: Game,
    envelopes: Vec<EventEnvelope>,
}

impl Draft {
    /// Start from a copy of `game`.
    pub fn new(game: &Game) -> Self {
        Self {
            game: game.clone(),
            envelopes: Vec::new(),
        }
    }

    /// The working copy with every emitted event applied.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Apply `event` to the working copy and queue it for broadcast.
    pub fn emit(&mut self, event: GameEvent) -> Result<(), ApplyError> {
        reducer::apply(&mut self.game, &event)?;
        self.envelopes.push(EventEnvelope {
            game_id: self.game.id,
            version: self.game.version,
            event,
        });
        Ok(())
    }

    /// Whether no event was emitted.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

impl GameHandle {
    fn new(game: Game) -> Self {
        Self {
            slot: Mutex::new(GameSlot {
                game,
                scoring_timer: None,
            }),
            sse: SseHub::new(SSE_CAPACITY),
        }
    }

    /// Serialize access to the game. Every read-modify-write happens under this lock.
    pub async fn lock(&self) -> MutexGuard<'_, GameSlot> {
        self.slot.lock().await
    }

    /// Broadcast hub of the game.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn GameStore>,
        catalog: Arc<dyn TrackCatalog>,
        retry: RetryPolicy,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            catalog,
            retry,
            games: DashMap::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Game-wide rule constants.
    pub fn rules(&self) -> &RuleConstants {
        &self.config.rules
    }

    /// Game persistence.
    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    /// Source of tracks.
    pub fn catalog(&self) -> &Arc<dyn TrackCatalog> {
        &self.catalog
    }

    /// Backoff for catalog calls.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of games currently held in memory.
    pub fn live_games(&self) -> usize {
        self.games.len()
    }

    /// Persist a brand-new game and start serving it.
    pub async fn register(&self, game: Game) -> Result<Arc<GameHandle>, ServiceError> {
        self.store.save_game(GameEntity::from(&game)).await?;
        let id = game.id;
        let handle = Arc::new(GameHandle::new(game));
        self.games.insert(id, handle.clone());
        Ok(handle)
    }

    /// Handle of a live game, loading it from storage when this process does
    /// not serve it yet. Finished games are served from storage without being
    /// kept in memory.
    pub async fn game(&self, id: Uuid) -> Result<Arc<GameHandle>, ServiceError> {
        if let Some(handle) = self.games.get(&id) {
            return Ok(handle.value().clone());
        }

        let entity = self
            .store
            .find_game(id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("game `{id}`")))?;
        let game = Game::from(entity);
        if game.state.is_terminal() {
            return Ok(Arc::new(GameHandle::new(game)));
        }
        let handle = self
            .games
            .entry(id)
            .or_insert_with(|| Arc::new(GameHandle::new(game)))
            .value()
            .clone();
        Ok(handle)
    }

    /// Persist the draft, make it the authoritative game and broadcast its
    /// events, in that order. A storage failure leaves the slot untouched.
    /// A game reaching a terminal phase stops being held in memory; its
    /// snapshot stays available from storage.
    pub async fn commit(
        &self,
        handle: &GameHandle,
        slot: &mut GameSlot,
        draft: Draft,
    ) -> Result<Vec<EventEnvelope>, ServiceError> {
        if draft.is_empty() {
            return Ok(Vec::new());
        }

        let Draft { game, envelopes } = draft;
        self.store.save_game(GameEntity::from(&game)).await?;
        slot.game = game;
        for envelope in &envelopes {
            sse_events::publish(handle.sse(), envelope);
        }
        if slot.game.state.is_terminal() {
            let game_id = slot.game.id;
            self.games.remove(&game_id);
            debug!(%game_id, phase = ?slot.game.state, "finished game released");
        }
        Ok(envelopes)
    }
}

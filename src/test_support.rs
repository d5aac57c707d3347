//! Fixtures shared by the unit tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;

use crate::{
    config::AppConfig,
    dao::{
        catalog::{CatalogError, CatalogResult, PlaylistInfo, TrackCatalog},
        game_store::MemoryGameStore,
    },
    services::retry::RetryPolicy,
    state::{
        AppState, SharedState,
        game::{
            ArtistsMatchMode, CreditsGuess, Game, GameSettings, Player, ReleaseYearGuess,
            TitleMatchMode, Track, Turn, TurnRevision,
        },
        state_machine::GamePhase,
    },
};

pub const PLAYLIST: &str = "test";

pub fn settings() -> GameSettings {
    GameSettings {
        playlist_ids: vec![PLAYLIST.to_string()],
        initial_tokens: 2,
        max_tokens: 10,
        timeline_length: 10,
        artists_match_mode: ArtistsMatchMode::One,
        title_match_mode: TitleMatchMode::Main,
        credits_similarity_threshold: 0.8,
        remove_stop_words: true,
        guess_timeout: Duration::from_secs(30),
        enable_catch_up: true,
    }
}

pub fn track(id: &str, release_year: i32) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {id}"),
        artists: vec![format!("Artist {id}")],
        release_year,
        artwork_url: None,
    }
}

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// A game in its first turn: every player owns one track (1960, 1970, ...)
/// and holds 2 tokens; the turn's track is dated 1985.
pub fn guessing_game(users: &[&str], active: usize) -> Game {
    let epoch = SystemTime::UNIX_EPOCH;
    let mut game = Game::new(settings(), users[0].to_string(), epoch);
    for (index, user) in users.iter().enumerate() {
        let year = 1960 + 10 * index as i32;
        let player = game
            .players
            .entry(user.to_string())
            .or_insert_with(|| Player {
                user_id: user.to_string(),
                is_game_master: false,
                tokens: 2,
                timeline: Vec::new(),
                joined_at: epoch,
            });
        player.timeline = vec![track(&format!("start-{user}"), year)];
    }

    game.state = GamePhase::Guessing;
    game.turns.push(Turn::new(
        0,
        TurnRevision::initial(),
        users[active].to_string(),
        track("turn-0", 1985),
        IndexMap::new(),
        epoch,
    ));
    game
}

pub fn release_guess(
    user_id: &str,
    position: usize,
    year: Option<i32>,
    token_cost: u32,
    secs: u64,
) -> ReleaseYearGuess {
    ReleaseYearGuess {
        created_at: at(secs),
        user_id: user_id.to_string(),
        token_cost,
        position,
        year,
    }
}

pub fn credits_guess(
    user_id: &str,
    artists: &[&str],
    title: &str,
    token_cost: u32,
    secs: u64,
) -> CreditsGuess {
    CreditsGuess {
        created_at: at(secs),
        user_id: user_id.to_string(),
        token_cost,
        artists: artists.iter().map(|artist| artist.to_string()).collect(),
        title: title.to_string(),
    }
}

/// Deterministic catalog handing out `q-0`, `q-1`, ... dated 1950, 1953, ...
/// Excluded ids are skipped. The first `failures` calls fail transiently.
#[derive(Clone, Default)]
pub struct QueueCatalog {
    next: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    queued: Arc<Mutex<VecDeque<Track>>>,
}

impl QueueCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        let catalog = Self::default();
        catalog.failures.store(failures, Ordering::SeqCst);
        catalog
    }

    /// Serve `track` before falling back to generated ones.
    pub fn enqueue(&self, track: Track) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(track);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn draw(&self, exclude: &HashSet<String>) -> CatalogResult<Track> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CatalogError::Unavailable("queue catalog is flaky".into()));
        }

        if let Some(track) = self.queued.lock().ok().and_then(|mut queued| queued.pop_front()) {
            return Ok(track);
        }
        loop {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let candidate = track(&format!("q-{index}"), 1950 + 3 * (index % 25) as i32);
            if !exclude.contains(&candidate.id) {
                return Ok(candidate);
            }
        }
    }
}

impl TrackCatalog for QueueCatalog {
    fn fetch_track(
        &self,
        playlist_ids: &[String],
        exclude: &HashSet<String>,
    ) -> BoxFuture<'static, CatalogResult<Track>> {
        let result = if playlist_ids.iter().all(|id| id == PLAYLIST) {
            self.draw(exclude)
        } else {
            Err(CatalogError::UnknownPlaylist(playlist_ids.join(",")))
        };
        async move { result }.boxed()
    }

    fn find_playlist(&self, id: &str) -> BoxFuture<'static, CatalogResult<Option<PlaylistInfo>>> {
        let info = (id == PLAYLIST).then(|| PlaylistInfo {
            id: PLAYLIST.to_string(),
            name: "Test".to_string(),
            track_count: usize::MAX,
        });
        async move { Ok(info) }.boxed()
    }
}

pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

/// Application state over an in-memory store and a [`QueueCatalog`], with
/// test settings as new-game defaults.
pub fn test_state_with(store: MemoryGameStore, catalog: QueueCatalog) -> SharedState {
    let mut config = AppConfig::default();
    config.defaults = settings();
    AppState::new(config, Arc::new(store), Arc::new(catalog), quick_retry())
}

pub fn test_state() -> SharedState {
    test_state_with(MemoryGameStore::new(), QueueCatalog::new())
}

/// Create a game mastered by `users[0]`, let the others join and start it.
/// With a fresh [`QueueCatalog`] player `i` owns `q-i` and the first turn's
/// track is `q-{users.len()}`.
pub async fn started_game(state: &SharedState, users: &[&str]) -> uuid::Uuid {
    let game = crate::services::game_service::create_game(
        state,
        users[0],
        crate::dto::game::CreateGameRequest::default(),
    )
    .await
    .unwrap();
    for user in &users[1..] {
        crate::services::game_service::join_game(state, game.id, user)
            .await
            .unwrap();
    }
    crate::services::game_service::start_game(state, game.id, users[0])
        .await
        .unwrap();
    game.id
}

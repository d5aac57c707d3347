use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::catalog::CatalogError,
    dto::game::CreateGameRequest,
    error::{GameError, ServiceError},
    rules::validator,
    services::{logged, turn_service},
    state::{
        Draft, SharedState,
        events::{EventEnvelope, GameEvent},
        game::{Game, Player, Turn, UserId},
        state_machine::{GamePhase, PhaseEvent},
    },
};

/// Open a new lobby with `user_id` as game master.
pub async fn create_game(
    state: &SharedState,
    user_id: &str,
    request: CreateGameRequest,
) -> Result<Game, ServiceError> {
    let settings = request.into_settings(&state.config().defaults);
    if settings.playlist_ids.is_empty() {
        return Err(GameError::Validation("at least one playlist is required".into()).into());
    }

    let catalog = state.catalog();
    for playlist_id in &settings.playlist_ids {
        let known = state
            .retry()
            .run("find_playlist", CatalogError::is_transient, || {
                catalog.find_playlist(playlist_id)
            })
            .await?;
        if known.is_none() {
            debug!(user_id, playlist_id, "game creation rejected: unknown playlist");
            return Err(GameError::Validation(format!("unknown playlist `{playlist_id}`")).into());
        }
    }

    let game = Game::new(settings, user_id.to_string(), SystemTime::now());
    state.register(game.clone()).await?;
    info!(game_id = %game.id, user_id, "game created");
    Ok(game)
}

/// Authoritative snapshot of a game. Clients resynchronise from it.
pub async fn get_game(state: &SharedState, game_id: Uuid) -> Result<Game, ServiceError> {
    let handle = state.game(game_id).await?;
    let slot = handle.lock().await;
    Ok(slot.game.clone())
}

/// Add `user_id` to a game still waiting for players.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        if game.state != GamePhase::WaitingForPlayers {
            return Err(GameError::UnexpectedState("game already started".into()).into());
        }
        if game.players.contains_key(user_id) {
            return Err(GameError::UnexpectedState("player already joined".into()).into());
        }
        let player = Player {
            user_id: user_id.to_string(),
            is_game_master: false,
            tokens: game.settings.initial_tokens,
            timeline: Vec::new(),
            joined_at: now,
        };
        draft.emit(GameEvent::PlayerJoined { player })?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("join", game_id, user_id, result)
}

/// Remove a player. Their contributions to the current turn are dropped and,
/// when they were the active player of an open turn, the turn passes to the
/// next player with the same track.
pub async fn leave_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        if game.player(user_id)?.is_game_master {
            return Err(GameError::GameMasterCannotLeave.into());
        }
        if game.state.is_terminal() {
            return Err(GameError::UnexpectedState("game is over".into()).into());
        }
        let (replacement_turn, token_deltas) = replacement_for(game, user_id);
        draft.emit(GameEvent::PlayerLeft {
            user_id: user_id.to_string(),
            replacement_turn,
            token_deltas,
        })?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("leave", game_id, user_id, result)
}

/// Turn taking over when `leaver` is the active player of an open turn: the
/// next player becomes active on the same track under a new revision, keeps
/// the other players' guesses and passes, and gets their own guess costs back.
fn replacement_for(game: &Game, leaver: &str) -> (Option<Turn>, IndexMap<UserId, i64>) {
    let mut token_deltas = IndexMap::new();
    let Ok(turn) = validator::guessing_turn(game) else {
        return (None, token_deltas);
    };
    if turn.active_user_id != leaver {
        return (None, token_deltas);
    }
    let Some(next_active) = game
        .next_player_after(leaver)
        .filter(|user_id| user_id.as_str() != leaver)
        .cloned()
    else {
        return (None, token_deltas);
    };

    let mut replacement = turn.clone();
    replacement.forget_player(leaver);
    replacement.revision = turn.revision.next();
    replacement.active_user_id = next_active.clone();

    let mut refund = 0;
    for guess in replacement
        .release_year_guesses
        .iter_mut()
        .filter(|guess| guess.user_id == next_active)
    {
        refund += guess.token_cost;
        guess.token_cost = 0;
    }
    for guess in replacement
        .credits_guesses
        .iter_mut()
        .filter(|guess| guess.user_id == next_active)
    {
        refund += guess.token_cost;
        guess.token_cost = 0;
    }
    if refund > 0 {
        token_deltas.insert(next_active, i64::from(refund));
    }
    (Some(replacement), token_deltas)
}

/// Deal the initial timelines and open the first turn.
pub async fn start_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        ensure_game_master(game, user_id)?;
        game.state
            .next(PhaseEvent::Start)
            .map_err(GameError::from)?;
        let min_players = state.rules().min_players;
        if game.players.len() < min_players {
            return Err(GameError::UnexpectedState(format!(
                "at least {min_players} players are required"
            ))
            .into());
        }

        let mut exclude = game.used_track_ids();
        let mut timelines = IndexMap::new();
        for player_id in game.players.keys() {
            let track =
                turn_service::draw_track(state, &game.settings.playlist_ids, &exclude).await?;
            exclude.insert(track.id.clone());
            timelines.insert(player_id.clone(), track);
        }
        draft.emit(GameEvent::GameStarted {
            timelines,
            started_at: now,
        })?;
        turn_service::open_turn(state, &mut draft, now).await?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("start", game_id, user_id, result)
}

/// Stop the game for good.
pub async fn abort_game(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        ensure_game_master(draft.game(), user_id)?;
        draft
            .game()
            .state
            .next(PhaseEvent::Abort)
            .map_err(GameError::from)?;
        draft.emit(GameEvent::GameAborted { aborted_at: now })?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("abort", game_id, user_id, result)
}

fn ensure_game_master(game: &Game, user_id: &str) -> Result<(), GameError> {
    if game.player(user_id)?.is_game_master {
        Ok(())
    } else {
        Err(GameError::NotGameMaster)
    }
}

//! Turn commands and the triggers they can fire: automatic scoring, the next
//! turn or the end of the game, and the scoring countdown.

use std::{collections::HashSet, time::SystemTime};

use futures::{FutureExt, future::BoxFuture};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::catalog::CatalogError,
    dto::game::{CreditsGuessRequest, ReleaseYearGuessRequest},
    error::{GameError, ServiceError},
    rules::{
        catch_up::catch_up_gains,
        ledger::{self, TokenAction},
        scoring,
        validator::{self, GuessKind},
    },
    services::{correction_service, logged},
    state::{
        AppState, Draft, GameHandle, GameSlot, ScoringTimer, SharedState,
        events::{EventEnvelope, GameEvent, TrackExchange},
        game::{CreditsGuess, Game, ReleaseYearGuess, Track, Turn, TurnPass, TurnRevision},
        state_machine::GamePhase,
    },
};

/// Place the turn's track (and optionally date it).
pub async fn guess_release_year(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    request: ReleaseYearGuessRequest,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let kind = GuessKind::ReleaseYear {
            position: request.position,
        };
        let token_cost =
            validator::check_guess(draft.game(), state.rules(), user_id, request.revision, kind)?;
        let turn_index = validator::guessing_turn(draft.game())?.index;
        draft.emit(GameEvent::ReleaseYearGuessCreated {
            turn_index,
            revision: request.revision,
            guess: ReleaseYearGuess {
                created_at: now,
                user_id: user_id.to_string(),
                token_cost,
                position: request.position,
                year: request.year,
            },
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("release_year_guess", game_id, user_id, result)
}

/// Guess the turn's artists and title.
pub async fn guess_credits(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    request: CreditsGuessRequest,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let token_cost = validator::check_guess(
            draft.game(),
            state.rules(),
            user_id,
            request.revision,
            GuessKind::Credits,
        )?;
        let turn_index = validator::guessing_turn(draft.game())?.index;
        draft.emit(GameEvent::CreditsGuessCreated {
            turn_index,
            revision: request.revision,
            guess: CreditsGuess {
                created_at: now,
                user_id: user_id.to_string(),
                token_cost,
                artists: request
                    .artists
                    .iter()
                    .map(|artist| artist.trim().to_string())
                    .collect(),
                title: request.title.trim().to_string(),
            },
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("credits_guess", game_id, user_id, result)
}

/// Decline to guess any further this turn. The active player's pass starts
/// the scoring countdown; the last pass scores the turn right away.
pub async fn pass_turn(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    revision: TurnRevision,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        validator::check_pass(draft.game(), user_id, revision)?;
        let turn_index = validator::guessing_turn(draft.game())?.index;
        draft.emit(GameEvent::TurnPassed {
            turn_index,
            revision,
            pass: TurnPass {
                user_id: user_id.to_string(),
                created_at: now,
            },
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("pass", game_id, user_id, result)
}

/// Swap the turn's track for a fresh one. Voids every guess of the turn.
pub async fn exchange_track(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    revision: TurnRevision,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        let rules = state.rules();
        let cost = validator::check_active_action(
            game,
            rules,
            user_id,
            revision,
            TokenAction::TrackExchange,
        )?;
        let turn = validator::guessing_turn(game)?;
        let token_deltas =
            ledger::exchange_deltas(turn, user_id, cost, rules.refund_voided_guesses);
        let (turn_index, next_revision) = (turn.index, turn.revision.next());
        let track = draw_track(state, &game.settings.playlist_ids, &game.used_track_ids()).await?;

        draft.emit(GameEvent::TrackExchanged {
            exchange: TrackExchange {
                turn_index,
                revision: next_revision,
                track,
                token_deltas,
            },
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("exchange", game_id, user_id, result)
}

/// Pay to take the turn's track into the active player's timeline. A fresh
/// track replaces it for the rest of the turn.
pub async fn buy_track(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    revision: TurnRevision,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        let rules = state.rules();
        let cost = validator::check_active_action(
            game,
            rules,
            user_id,
            revision,
            TokenAction::TimelinePurchase,
        )?;
        let turn = validator::guessing_turn(game)?;
        let bought = turn.track.clone();
        let token_deltas = ledger::exchange_deltas(turn, user_id, 0, rules.refund_voided_guesses);
        let (turn_index, next_revision) = (turn.index, turn.revision.next());
        let track = draw_track(state, &game.settings.playlist_ids, &game.used_track_ids()).await?;

        draft.emit(GameEvent::TrackBought {
            user_id: user_id.to_string(),
            track: bought,
            cost,
            exchange: TrackExchange {
                turn_index,
                revision: next_revision,
                track,
                token_deltas,
            },
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("buy", game_id, user_id, result)
}

/// Acknowledge the scored turn. Once every player did, the next turn starts
/// or the game ends.
pub async fn complete_turn(
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
        game.player(user_id)?;
        let turn = match (game.state, game.current_turn()) {
            (GamePhase::Scoring, Some(turn)) => turn,
            _ => return Err(GameError::InactiveTurn.into()),
        };
        if turn.has_completed(user_id) {
            return Err(GameError::UnexpectedState("turn already completed".into()).into());
        }
        if turn.open_proposal().is_some() {
            return Err(
                GameError::UnexpectedState("a correction vote is in progress".into()).into(),
            );
        }
        let turn_index = turn.index;
        draft.emit(GameEvent::TurnCompleted {
            turn_index,
            user_id: user_id.to_string(),
        })?;

        finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("complete", game_id, user_id, result)
}

/// Run the triggers, persist and broadcast the draft, then align the scoring
/// countdown with the committed game.
pub(crate) async fn finish(
    state: &SharedState,
    handle: &GameHandle,
    slot: &mut GameSlot,
    mut draft: Draft,
    now: SystemTime,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    settle_triggers(state, &mut draft, now).await?;
    let envelopes = state.commit(handle, slot, draft).await?;
    reconcile_timer(state, slot);
    Ok(envelopes)
}

/// Fire whatever the last events made due, in order: resolve the open
/// correction, score a turn everyone passed, then move past a turn everyone
/// completed.
pub(crate) async fn settle_triggers(
    state: &AppState,
    draft: &mut Draft,
    now: SystemTime,
) -> Result<(), ServiceError> {
    if let Some(event) = correction_service::pending_resolution(draft.game(), state.rules())? {
        draft.emit(event)?;
    }

    let everyone_passed = validator::guessing_turn(draft.game())
        .is_ok_and(|turn| validator::everyone_passed(draft.game(), turn));
    if everyone_passed {
        score_current_turn(state, draft)?;
    }

    if everyone_completed(draft.game()) {
        let winners = draft.game().winners();
        if winners.is_empty() {
            open_turn(state, draft, now).await?;
        } else {
            draft.emit(GameEvent::GameCompleted {
                winners,
                completed_at: now,
            })?;
        }
    }
    Ok(())
}

fn everyone_completed(game: &Game) -> bool {
    match (game.state, game.current_turn()) {
        (GamePhase::Scoring, Some(turn)) => game
            .players
            .keys()
            .all(|user_id| turn.has_completed(user_id)),
        _ => false,
    }
}

fn score_current_turn(state: &AppState, draft: &mut Draft) -> Result<(), ServiceError> {
    let game = draft.game();
    let turn = validator::guessing_turn(game)?;
    let event = GameEvent::TurnScored {
        turn_index: turn.index,
        scoring: scoring::score_turn(game, turn, state.rules()),
    };
    draft.emit(event)?;
    Ok(())
}

/// Draw a track and open the next turn for the next player in join order.
pub(crate) async fn open_turn(
    state: &AppState,
    draft: &mut Draft,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let game = draft.game();
    let (index, revision, active) = match game.current_turn() {
        Some(previous) => (
            previous.index + 1,
            previous.revision.next(),
            game.next_player_after(&previous.active_user_id)
                .or_else(|| game.players.keys().next()),
        ),
        None => (0, TurnRevision::initial(), game.players.keys().next()),
    };
    let active = active
        .cloned()
        .ok_or_else(|| GameError::UnexpectedState("no player left to take a turn".into()))?;
    let catch_up = catch_up_gains(game, state.rules());
    let track = draw_track(state, &game.settings.playlist_ids, &game.used_track_ids()).await?;

    draft.emit(GameEvent::NewTurn {
        turn: Turn::new(index, revision, active, track, catch_up, now),
    })?;
    Ok(())
}

/// Fetch an unused track, retrying transient catalog failures.
pub(crate) async fn draw_track(
    state: &AppState,
    playlist_ids: &[String],
    exclude: &HashSet<String>,
) -> Result<Track, ServiceError> {
    let catalog = state.catalog();
    let track = state
        .retry()
        .run("fetch_track", CatalogError::is_transient, || {
            catalog.fetch_track(playlist_ids, exclude)
        })
        .await?;
    Ok(track)
}

/// Turn and revision the countdown should be armed for: the open turn once
/// its active player passed.
fn countdown_target(game: &Game) -> Option<(usize, TurnRevision)> {
    let turn = validator::guessing_turn(game).ok()?;
    turn.has_passed(&turn.active_user_id)
        .then_some((turn.index, turn.revision))
}

/// Arm, keep or cancel the scoring countdown so it matches the game.
pub(crate) fn reconcile_timer(state: &SharedState, slot: &mut GameSlot) {
    let wanted = countdown_target(&slot.game);
    let armed = slot
        .scoring_timer
        .as_ref()
        .map(|timer| (timer.turn_index, timer.revision));
    if armed == wanted {
        return;
    }

    let game_id = slot.game.id;
    if let Some(timer) = slot.scoring_timer.take() {
        timer.handle.abort();
        debug!(%game_id, turn_index = timer.turn_index, "scoring countdown cancelled");
    }

    if let Some((turn_index, revision)) = wanted {
        let timeout = slot.game.settings.guess_timeout;
        let state = state.clone();
        let handle = tokio::spawn(async move {
            sleep(timeout).await;
            score_on_timeout(state, game_id, turn_index, revision).await;
        });
        slot.scoring_timer = Some(ScoringTimer {
            turn_index,
            revision,
            handle,
        });
        debug!(%game_id, turn_index, ?timeout, "scoring countdown armed");
    }
}

/// Countdown expiry. Re-enters through the game lock and only scores when the
/// countdown is still the one armed for this turn and revision.
fn score_on_timeout(
    state: SharedState,
    game_id: Uuid,
    turn_index: usize,
    revision: TurnRevision,
) -> BoxFuture<'static, ()> {
    async move {
        let handle = match state.game(game_id).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%game_id, error = %err, "scoring countdown lost its game");
                return;
            }
        };
        let mut slot = handle.lock().await;
        let current = slot
            .scoring_timer
            .as_ref()
            .is_some_and(|timer| timer.targets(turn_index, revision));
        if !current {
            return;
        }
        slot.scoring_timer = None;

        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);
        let result = match score_current_turn(&state, &mut draft) {
            Ok(()) => finish(&state, &handle, &mut slot, draft, now).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(envelopes) => info!(
                %game_id,
                turn_index,
                events = envelopes.len(),
                "turn scored after countdown"
            ),
            Err(err) => {
                warn!(%game_id, turn_index, error = %err, "countdown scoring failed; re-arming");
                reconcile_timer(&state, &mut slot);
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::{
        dao::game_store::MemoryGameStore,
        services::game_service,
        test_support::{QueueCatalog, started_game, test_state, test_state_with, track},
    };

    async fn game(state: &SharedState, game_id: Uuid) -> Game {
        game_service::get_game(state, game_id).await.unwrap()
    }

    fn kinds(envelopes: &[EventEnvelope]) -> Vec<&'static str> {
        envelopes
            .iter()
            .map(|envelope| envelope.event.event_type())
            .collect()
    }

    fn year_guess(revision: u32, position: usize, year: Option<i32>) -> ReleaseYearGuessRequest {
        ReleaseYearGuessRequest {
            revision: TurnRevision(revision),
            position,
            year,
        }
    }

    async fn pass_all(state: &SharedState, game_id: Uuid, users: &[&str], revision: u32) {
        for user in users {
            pass_turn(state, game_id, user, TurnRevision(revision))
                .await
                .unwrap();
        }
    }

    async fn complete_all(state: &SharedState, game_id: Uuid, users: &[&str]) -> Vec<EventEnvelope> {
        let mut last = Vec::new();
        for user in users {
            last = complete_turn(state, game_id, user).await.unwrap();
        }
        last
    }

    #[tokio::test]
    async fn last_pass_scores_and_last_completion_opens_next_turn() {
        let state = test_state();
        let users = ["alice", "bob", "carol"];
        let game_id = started_game(&state, &users).await;

        // alice owns 1950 and the turn's track is dated 1959.
        guess_release_year(&state, game_id, "alice", year_guess(0, 1, Some(1959)))
            .await
            .unwrap();
        guess_release_year(&state, game_id, "bob", year_guess(0, 0, None))
            .await
            .unwrap();
        assert_eq!(game(&state, game_id).await.players["bob"].tokens, 1);

        pass_turn(&state, game_id, "alice", TurnRevision(0)).await.unwrap();
        pass_turn(&state, game_id, "bob", TurnRevision(0)).await.unwrap();
        let events = pass_turn(&state, game_id, "carol", TurnRevision(0))
            .await
            .unwrap();
        assert_eq!(kinds(&events), vec!["turn_passed", "turn_scored"]);

        let scored = game(&state, game_id).await;
        assert_eq!(scored.state, GamePhase::Scoring);
        assert_eq!(scored.players["alice"].timeline.len(), 2);
        assert_eq!(scored.players["alice"].tokens, 4);
        assert_eq!(scored.players["bob"].tokens, 1);
        let handle = state.game(game_id).await.unwrap();
        assert!(handle.lock().await.scoring_timer.is_none());

        let events = complete_all(&state, game_id, &users).await;
        assert_eq!(kinds(&events), vec!["turn_completed", "new_turn"]);

        let next = game(&state, game_id).await;
        let turn = next.current_turn().unwrap();
        assert_eq!(next.state, GamePhase::Guessing);
        assert_eq!(turn.index, 1);
        assert_eq!(turn.active_user_id, "bob");
        assert_eq!(turn.revision, TurnRevision(1));
    }

    #[tokio::test]
    async fn reaching_timeline_length_completes_the_game() {
        let state = test_state();
        let users = ["alice", "bob"];
        let game_id = started_game(&state, &users).await;
        {
            let handle = state.game(game_id).await.unwrap();
            handle.lock().await.game.settings.timeline_length = 2;
        }

        guess_release_year(&state, game_id, "alice", year_guess(0, 1, None))
            .await
            .unwrap();
        pass_all(&state, game_id, &users, 0).await;
        let mut receiver = state.game(game_id).await.unwrap().sse().subscribe();
        let events = complete_all(&state, game_id, &users).await;

        assert_eq!(kinds(&events), vec!["turn_completed", "game_completed"]);
        let done = game(&state, game_id).await;
        assert_eq!(done.state, GamePhase::Completed);
        assert!(matches!(
            &events[1].event,
            GameEvent::GameCompleted { winners, .. } if winners == &vec!["alice".to_string()]
        ));

        // The finished game is released: its stream ends after the last event.
        assert_eq!(state.live_games(), 0);
        let mut streamed = Vec::new();
        while let Ok(message) = receiver.recv().await {
            streamed.push(message.event.unwrap_or_default());
        }
        assert_eq!(streamed.last().map(String::as_str), Some("game_completed"));
    }

    #[tokio::test]
    async fn exchange_voids_guesses_and_fences_stale_requests() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;

        guess_release_year(&state, game_id, "bob", year_guess(0, 0, None))
            .await
            .unwrap();
        let events = exchange_track(&state, game_id, "alice", TurnRevision(0))
            .await
            .unwrap();
        assert_eq!(kinds(&events), vec!["track_exchanged"]);

        let exchanged = game(&state, game_id).await;
        let turn = exchanged.current_turn().unwrap();
        assert_eq!(turn.revision, TurnRevision(1));
        assert!(turn.release_year_guesses.is_empty());
        assert_eq!(exchanged.players["bob"].tokens, 2);
        assert_eq!(exchanged.players["alice"].tokens, 1);

        let err = guess_release_year(&state, game_id, "bob", year_guess(0, 0, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::StaleRevision {
                expected: TurnRevision(1),
                got: TurnRevision(0),
            })
        ));
        assert!(matches!(
            exchange_track(&state, game_id, "bob", TurnRevision(1)).await,
            Err(ServiceError::Game(GameError::UnexpectedState(_)))
        ));
    }

    #[tokio::test]
    async fn bought_track_lands_in_the_buyer_timeline() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;

        let err = buy_track(&state, game_id, "alice", TurnRevision(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::InsufficientTokens { required: 3, .. })
        ));

        {
            let handle = state.game(game_id).await.unwrap();
            handle.lock().await.game.players["alice"].tokens = 5;
        }
        let bought_id = game(&state, game_id).await.current_turn().unwrap().track.id.clone();
        buy_track(&state, game_id, "alice", TurnRevision(0))
            .await
            .unwrap();

        let after = game(&state, game_id).await;
        let alice = &after.players["alice"];
        assert_eq!(alice.tokens, 2);
        assert!(alice.timeline.iter().any(|track| track.id == bought_id));
        let turn = after.current_turn().unwrap();
        assert_ne!(turn.track.id, bought_id);
        assert_eq!(turn.revision, TurnRevision(1));
    }

    #[tokio::test]
    async fn storage_outage_rejects_without_touching_the_game() {
        let store = MemoryGameStore::new();
        let state = test_state_with(store.clone(), QueueCatalog::new());
        let game_id = started_game(&state, &["alice", "bob"]).await;
        let before = game(&state, game_id).await;
        let handle = state.game(game_id).await.unwrap();
        let mut receiver = handle.sse().subscribe();

        store.set_offline(true);
        let err = pass_turn(&state, game_id, "bob", TurnRevision(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(game(&state, game_id).await, before);
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));

        store.set_offline(false);
        pass_turn(&state, game_id, "bob", TurnRevision(0)).await.unwrap();
        assert_eq!(game(&state, game_id).await.version, before.version + 1);
        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn catalog_hiccups_are_retried() {
        let catalog = QueueCatalog::failing(2);
        let state = test_state_with(MemoryGameStore::new(), catalog.clone());
        let game_id = started_game(&state, &["alice", "bob"]).await;

        let started = game(&state, game_id).await;
        assert_eq!(started.state, GamePhase::Guessing);
        // two timelines and one turn, plus the two failed calls
        assert_eq!(catalog.calls(), 5);
    }

    #[tokio::test]
    async fn countdown_scores_after_active_player_passed() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;
        {
            let handle = state.game(game_id).await.unwrap();
            handle.lock().await.game.settings.guess_timeout = Duration::from_millis(50);
        }
        let handle = state.game(game_id).await.unwrap();
        let mut receiver = handle.sse().subscribe();

        guess_release_year(&state, game_id, "alice", year_guess(0, 1, None))
            .await
            .unwrap();
        pass_turn(&state, game_id, "alice", TurnRevision(0)).await.unwrap();
        assert!(handle.lock().await.scoring_timer.is_some());
        assert_eq!(game(&state, game_id).await.state, GamePhase::Guessing);

        sleep(Duration::from_millis(300)).await;

        let scored = game(&state, game_id).await;
        assert_eq!(scored.state, GamePhase::Scoring);
        assert_eq!(scored.players["alice"].timeline.len(), 2);
        assert!(handle.lock().await.scoring_timer.is_none());

        let mut published = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            published.push(event.event.unwrap_or_default());
        }
        assert_eq!(
            published,
            vec!["release_year_guess_created", "turn_passed", "turn_scored"]
        );
    }

    #[tokio::test]
    async fn correction_proposal_cancels_the_countdown() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;
        {
            let handle = state.game(game_id).await.unwrap();
            handle.lock().await.game.settings.guess_timeout = Duration::from_millis(50);
        }

        pass_turn(&state, game_id, "alice", TurnRevision(0)).await.unwrap();
        crate::services::correction_service::propose_correction(
            &state,
            game_id,
            "bob",
            crate::dto::game::CorrectionRequest {
                revision: TurnRevision(0),
                release_year: 1900,
            },
        )
        .await
        .unwrap();

        let handle = state.game(game_id).await.unwrap();
        assert!(handle.lock().await.scoring_timer.is_none());
        sleep(Duration::from_millis(200)).await;
        let still = game(&state, game_id).await;
        assert_eq!(still.state, GamePhase::Guessing);
        assert!(still.current_turn().unwrap().passes.is_empty());
    }

    #[tokio::test]
    async fn completion_requires_a_scored_turn() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;

        assert!(matches!(
            complete_turn(&state, game_id, "bob").await,
            Err(ServiceError::Game(GameError::InactiveTurn))
        ));

        pass_all(&state, game_id, &["alice", "bob"], 0).await;
        complete_turn(&state, game_id, "bob").await.unwrap();
        assert!(matches!(
            complete_turn(&state, game_id, "bob").await,
            Err(ServiceError::Game(GameError::UnexpectedState(_)))
        ));
    }

    #[tokio::test]
    async fn late_guess_after_scoring_is_inactive() {
        let state = test_state();
        let game_id = started_game(&state, &["alice", "bob"]).await;
        pass_all(&state, game_id, &["alice", "bob"], 0).await;

        let err = guess_release_year(&state, game_id, "bob", year_guess(0, 0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::InactiveTurn)));
    }

    #[tokio::test]
    async fn catch_up_tokens_are_granted_at_turn_start() {
        let state = test_state();
        let users = ["alice", "bob"];
        let game_id = started_game(&state, &users).await;
        {
            let handle = state.game(game_id).await.unwrap();
            let mut slot = handle.lock().await;
            let alice = &mut slot.game.players["alice"];
            alice.timeline.push(track("extra-1", 1990));
            alice.timeline.push(track("extra-2", 1995));
        }

        pass_all(&state, game_id, &users, 0).await;
        complete_all(&state, game_id, &users).await;

        let next = game(&state, game_id).await;
        let turn = next.current_turn().unwrap();
        assert_eq!(turn.catch_up_token_gain.get("bob"), Some(&1));
        assert_eq!(next.players["bob"].tokens, 3);
    }
}

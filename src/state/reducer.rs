//! The single code path mutating a [`Game`]. Both the authoritative server and
//! client mirrors fold [`GameEvent`]s through [`apply`].

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    rules::{ledger, timeline},
    state::{
        events::{CorrectionOutcome, GameEvent, TrackExchange},
        game::{CorrectionState, Game, Player, Scoring, Track, Turn, TurnRevision, UserId},
        state_machine::{GamePhase, InvalidTransition, PhaseEvent},
    },
};

/// An event that does not fit the game it is applied to.
///
/// On the server this means a command handler produced an inconsistent event;
/// on a mirror it means the local copy diverged and must be resynchronised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The phase machine refused the event.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    /// The event does not fit the current phase.
    #[error("event not applicable while in {0:?}")]
    UnexpectedPhase(GamePhase),
    /// The event names a player who is not in the game.
    #[error("unknown player `{0}`")]
    UnknownPlayer(UserId),
    /// The joining player is already in the game.
    #[error("player `{0}` already joined")]
    DuplicatePlayer(UserId),
    /// The event targets another turn than the current one.
    #[error("event targets turn {got} but the current turn is {expected:?}")]
    TurnMismatch {
        /// Index of the current turn, if any.
        expected: Option<usize>,
        /// Turn index carried by the event.
        got: usize,
    },
    /// The event was built against another revision of the turn.
    #[error("event carries revision {got} but the turn is at {expected}")]
    RevisionMismatch {
        /// Current revision of the turn.
        expected: TurnRevision,
        /// Revision carried by the event.
        got: TurnRevision,
    },
    /// A debit would make the balance negative.
    #[error("player `{0}` cannot afford the debit")]
    Overdraft(UserId),
    /// Vote or resolution without an open proposal.
    #[error("no correction proposal is open")]
    NoOpenProposal,
    /// A rescoring was given for an unscored turn, or the reverse.
    #[error("rescoring does not match the turn's scoring state")]
    RescoreMismatch,
}

/// Apply `event` to `game` and bump its version.
///
/// The game may be left half-updated when an error is returned; callers apply
/// events to a copy and discard it on failure.
pub fn apply(game: &mut Game, event: &GameEvent) -> Result<(), ApplyError> {
    match event {
        GameEvent::PlayerJoined { player } => {
            expect_phase(game, GamePhase::WaitingForPlayers)?;
            if game.players.contains_key(&player.user_id) {
                return Err(ApplyError::DuplicatePlayer(player.user_id.clone()));
            }
            game.players.insert(player.user_id.clone(), player.clone());
        }
        GameEvent::PlayerLeft {
            user_id,
            replacement_turn,
            token_deltas,
        } => {
            game.players
                .shift_remove(user_id)
                .ok_or_else(|| ApplyError::UnknownPlayer(user_id.clone()))?;
            if let Some(turn) = game.turns.last_mut() {
                turn.forget_player(user_id);
            }
            if let Some(replacement) = replacement_turn {
                let current = current_turn_mut(game, replacement.index)?;
                *current = replacement.clone();
            }
            apply_deltas(game, token_deltas)?;
        }
        GameEvent::GameStarted { timelines, .. } => {
            game.state = game.state.next(PhaseEvent::Start)?;
            for (user_id, track) in timelines {
                player_mut(game, user_id)?.timeline = vec![track.clone()];
            }
        }
        GameEvent::GameAborted { .. } => {
            game.state = game.state.next(PhaseEvent::Abort)?;
        }
        GameEvent::NewTurn { turn } => {
            game.state = game.state.next(PhaseEvent::TurnCreated)?;
            if turn.index != game.turns.len() {
                return Err(ApplyError::TurnMismatch {
                    expected: Some(game.turns.len()),
                    got: turn.index,
                });
            }
            let gains: IndexMap<UserId, i64> = turn
                .catch_up_token_gain
                .iter()
                .map(|(user_id, gain)| (user_id.clone(), i64::from(*gain)))
                .collect();
            apply_deltas(game, &gains)?;
            game.turns.push(turn.clone());
        }
        GameEvent::ReleaseYearGuessCreated {
            turn_index,
            revision,
            guess,
        } => {
            expect_phase(game, GamePhase::Guessing)?;
            debit(game, &guess.user_id, guess.token_cost)?;
            open_turn_mut(game, *turn_index, *revision)?
                .release_year_guesses
                .push(guess.clone());
        }
        GameEvent::CreditsGuessCreated {
            turn_index,
            revision,
            guess,
        } => {
            expect_phase(game, GamePhase::Guessing)?;
            debit(game, &guess.user_id, guess.token_cost)?;
            open_turn_mut(game, *turn_index, *revision)?
                .credits_guesses
                .push(guess.clone());
        }
        GameEvent::TurnPassed {
            turn_index,
            revision,
            pass,
        } => {
            expect_phase(game, GamePhase::Guessing)?;
            player_mut(game, &pass.user_id)?;
            open_turn_mut(game, *turn_index, *revision)?
                .passes
                .push(pass.clone());
        }
        GameEvent::TrackExchanged { exchange } => {
            expect_phase(game, GamePhase::Guessing)?;
            apply_exchange(game, exchange)?;
        }
        GameEvent::TrackBought {
            user_id,
            track,
            cost,
            exchange,
        } => {
            expect_phase(game, GamePhase::Guessing)?;
            debit(game, user_id, *cost)?;
            let buyer = player_mut(game, user_id)?;
            buyer.timeline = timeline::insert(&buyer.timeline, track);
            apply_exchange(game, exchange)?;
        }
        GameEvent::TurnScored {
            turn_index,
            scoring,
        } => {
            game.state = game.state.next(PhaseEvent::TurnScored)?;
            let track = current_turn_mut(game, *turn_index)?.track.clone();
            apply_scoring(game, &track, scoring)?;
            current_turn_mut(game, *turn_index)?.scoring = Some(scoring.clone());
        }
        GameEvent::TurnCompleted {
            turn_index,
            user_id,
        } => {
            expect_phase(game, GamePhase::Scoring)?;
            player_mut(game, user_id)?;
            let turn = current_turn_mut(game, *turn_index)?;
            if !turn.has_completed(user_id) {
                turn.completed_by.push(user_id.clone());
            }
        }
        GameEvent::GameCompleted { .. } => {
            game.state = game.state.next(PhaseEvent::Won)?;
        }
        GameEvent::CorrectionProposed {
            turn_index,
            proposal,
        } => {
            let turn = current_turn_mut(game, *turn_index)?;
            turn.passes.clear();
            turn.correction_proposal = Some(proposal.clone());
        }
        GameEvent::CorrectionVoted { turn_index, vote } => {
            current_turn_mut(game, *turn_index)?
                .correction_proposal
                .as_mut()
                .filter(|proposal| proposal.is_open())
                .ok_or(ApplyError::NoOpenProposal)?
                .votes
                .push(vote.clone());
        }
        GameEvent::CorrectionResolved {
            turn_index,
            outcome,
        } => resolve_correction(game, *turn_index, outcome)?,
    }

    game.version += 1;
    Ok(())
}

/// Credit a scoring: the position winner receives the track and every player
/// receives the refunds and effective rewards listed in the scoring.
///
/// Players listed in the scoring who have since left are skipped.
pub fn apply_scoring(game: &mut Game, track: &Track, scoring: &Scoring) -> Result<(), ApplyError> {
    if let Some(player) = winner_mut(game, scoring) {
        player.timeline = timeline::insert(&player.timeline, track);
    }
    let credited = present_credits(game, scoring, 1);
    apply_deltas(game, &credited)
}

/// Exact inverse of [`apply_scoring`] for the same track and scoring.
pub fn revert_scoring(game: &mut Game, track: &Track, scoring: &Scoring) -> Result<(), ApplyError> {
    if let Some(player) = winner_mut(game, scoring) {
        player.timeline = timeline::remove(&player.timeline, &track.id);
    }
    let debited = present_credits(game, scoring, -1);
    apply_deltas(game, &debited)
}

fn winner_mut<'a>(game: &'a mut Game, scoring: &Scoring) -> Option<&'a mut Player> {
    scoring
        .position
        .winner
        .as_ref()
        .and_then(|winner| game.players.get_mut(winner))
}

fn present_credits(game: &Game, scoring: &Scoring, sign: i64) -> IndexMap<UserId, i64> {
    scoring
        .credited()
        .into_iter()
        .filter(|(user_id, _)| game.players.contains_key(user_id))
        .map(|(user_id, tokens)| (user_id, sign * i64::from(tokens)))
        .collect()
}

fn resolve_correction(
    game: &mut Game,
    turn_index: usize,
    outcome: &CorrectionOutcome,
) -> Result<(), ApplyError> {
    let turn = current_turn_mut(game, turn_index)?;
    let proposal = turn
        .correction_proposal
        .as_mut()
        .filter(|proposal| proposal.is_open())
        .ok_or(ApplyError::NoOpenProposal)?;

    let rescored = match outcome {
        CorrectionOutcome::Rejected => {
            proposal.state = CorrectionState::Rejected;
            return Ok(());
        }
        CorrectionOutcome::Accepted { rescored } => rescored,
    };
    proposal.state = CorrectionState::Accepted;
    let corrected_year = proposal.release_year;
    if turn.scoring.is_some() != rescored.is_some() {
        return Err(ApplyError::RescoreMismatch);
    }

    let previous = turn.scoring.take();
    let previous_track = turn.track.clone();
    turn.track.release_year = corrected_year;
    let corrected_track = turn.track.clone();

    if let Some(previous) = previous {
        revert_scoring(game, &previous_track, &previous)?;
    }
    if let Some(rescored) = rescored {
        apply_scoring(game, &corrected_track, rescored)?;
        current_turn_mut(game, turn_index)?.scoring = Some(rescored.clone());
    }
    Ok(())
}

fn apply_exchange(game: &mut Game, exchange: &TrackExchange) -> Result<(), ApplyError> {
    let turn = current_turn_mut(game, exchange.turn_index)?;
    if turn.scoring.is_some() {
        return Err(ApplyError::UnexpectedPhase(GamePhase::Scoring));
    }
    turn.revision = exchange.revision;
    turn.track = exchange.track.clone();
    turn.release_year_guesses.clear();
    turn.credits_guesses.clear();
    turn.passes.clear();
    turn.correction_proposal = None;
    apply_deltas(game, &exchange.token_deltas)
}

fn apply_deltas(game: &mut Game, deltas: &IndexMap<UserId, i64>) -> Result<(), ApplyError> {
    let max_tokens = game.settings.max_tokens;
    for (user_id, delta) in deltas {
        let player = player_mut(game, user_id)?;
        player.tokens = ledger::apply_delta(player.tokens, *delta, max_tokens);
    }
    Ok(())
}

fn debit(game: &mut Game, user_id: &str, cost: u32) -> Result<(), ApplyError> {
    let player = player_mut(game, user_id)?;
    player.tokens = player
        .tokens
        .checked_sub(cost)
        .ok_or_else(|| ApplyError::Overdraft(user_id.to_string()))?;
    Ok(())
}

fn expect_phase(game: &Game, phase: GamePhase) -> Result<(), ApplyError> {
    if game.state == phase {
        Ok(())
    } else {
        Err(ApplyError::UnexpectedPhase(game.state))
    }
}

fn player_mut<'a>(game: &'a mut Game, user_id: &str) -> Result<&'a mut Player, ApplyError> {
    game.players
        .get_mut(user_id)
        .ok_or_else(|| ApplyError::UnknownPlayer(user_id.to_string()))
}

fn current_turn_mut(game: &mut Game, turn_index: usize) -> Result<&mut Turn, ApplyError> {
    let expected = game.turns.len().checked_sub(1);
    match game.turns.last_mut() {
        Some(turn) if turn.index == turn_index => Ok(turn),
        _ => Err(ApplyError::TurnMismatch {
            expected,
            got: turn_index,
        }),
    }
}

fn open_turn_mut(
    game: &mut Game,
    turn_index: usize,
    revision: TurnRevision,
) -> Result<&mut Turn, ApplyError> {
    let turn = current_turn_mut(game, turn_index)?;
    if turn.revision != revision {
        return Err(ApplyError::RevisionMismatch {
            expected: turn.revision,
            got: revision,
        });
    }
    Ok(turn)
}

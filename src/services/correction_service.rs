use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    config::RuleConstants,
    dto::game::{CorrectionRequest, CorrectionVoteRequest},
    error::{GameError, ServiceError},
    rules::{correction, scoring},
    services::{logged, turn_service},
    state::{
        Draft, SharedState,
        events::{CorrectionOutcome, EventEnvelope, GameEvent},
        game::{
            CorrectionProposal, CorrectionState, CorrectionVote, Game, Scoring, Turn,
        },
        reducer::{self, ApplyError},
    },
};

/// Ask the other players to re-date the current turn's track.
pub async fn propose_correction(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    request: CorrectionRequest,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        let game = draft.game();
        correction::check_proposal(game, user_id, request.revision, request.release_year)?;
        let turn = game
            .current_turn()
            .ok_or(GameError::InactiveTurn)?;
        let event = GameEvent::CorrectionProposed {
            turn_index: turn.index,
            proposal: CorrectionProposal {
                created_by: user_id.to_string(),
                created_at: now,
                release_year: request.release_year,
                previous_release_year: turn.track.release_year,
                state: CorrectionState::Voting,
                votes: Vec::new(),
            },
        };
        draft.emit(event)?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("propose_correction", game_id, user_id, result)
}

/// Vote on the open proposal. The vote reaching a majority (or making it
/// unreachable) resolves the proposal in the same command.
pub async fn vote_correction(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    request: CorrectionVoteRequest,
) -> Result<Vec<EventEnvelope>, ServiceError> {
    let result = async {
        let handle = state.game(game_id).await?;
        let mut slot = handle.lock().await;
        let now = SystemTime::now();
        let mut draft = Draft::new(&slot.game);

        correction::check_vote(draft.game(), user_id, request.revision)?;
        let turn_index = draft
            .game()
            .current_turn()
            .map(|turn| turn.index)
            .ok_or(GameError::InactiveTurn)?;
        draft.emit(GameEvent::CorrectionVoted {
            turn_index,
            vote: CorrectionVote {
                user_id: user_id.to_string(),
                agree: request.agree,
                created_at: now,
            },
        })?;

        turn_service::finish(state, &handle, &mut slot, draft, now).await
    }
    .await;
    logged("vote_correction", game_id, user_id, result)
}

/// Resolution event for the open proposal of the current turn, once its votes
/// among the current players settle it.
pub(crate) fn pending_resolution(
    game: &Game,
    rules: &RuleConstants,
) -> Result<Option<GameEvent>, ApplyError> {
    let Some(turn) = game.current_turn() else {
        return Ok(None);
    };
    let Some(proposal) = turn.open_proposal() else {
        return Ok(None);
    };

    let outcome = match correction::resolve(proposal, game.players.len()) {
        CorrectionState::Voting => return Ok(None),
        CorrectionState::Rejected => CorrectionOutcome::Rejected,
        CorrectionState::Accepted => CorrectionOutcome::Accepted {
            rescored: turn
                .scoring
                .as_ref()
                .map(|previous| rescore(game, turn, previous, proposal.release_year, rules))
                .transpose()?,
        },
    };
    Ok(Some(GameEvent::CorrectionResolved {
        turn_index: turn.index,
        outcome,
    }))
}

/// Score `turn` again with `corrected_year`, against the balances and
/// timelines the game had before `previous` was credited.
pub fn rescore(
    game: &Game,
    turn: &Turn,
    previous: &Scoring,
    corrected_year: i32,
    rules: &RuleConstants,
) -> Result<Scoring, ApplyError> {
    let mut reverted = game.clone();
    reducer::revert_scoring(&mut reverted, &turn.track, previous)?;

    let mut corrected = turn.clone();
    corrected.track.release_year = corrected_year;
    corrected.scoring = None;
    Ok(scoring::score_turn(&reverted, &corrected, rules))
}

//! Release-year correction voting.

use crate::{
    error::GameError,
    state::{
        game::{CorrectionProposal, CorrectionState, Game, Turn, TurnRevision},
        state_machine::GamePhase,
    },
};

use super::validator::check_revision;

/// Agreeing votes needed to accept a proposal among `player_count` players.
pub fn required_votes(player_count: usize) -> usize {
    player_count.div_ceil(2)
}

/// State a proposal reaches with its current votes and `player_count` players.
///
/// Accepted once agreeing votes reach the majority; rejected as soon as the
/// disagreeing votes make that majority unreachable; voting otherwise.
pub fn resolve(proposal: &CorrectionProposal, player_count: usize) -> CorrectionState {
    let required = required_votes(player_count);
    let (agree, disagree) = proposal.tally();
    if agree >= required {
        CorrectionState::Accepted
    } else if disagree > player_count.saturating_sub(required) {
        CorrectionState::Rejected
    } else {
        CorrectionState::Voting
    }
}

/// The current turn, provided it can still receive corrections.
fn correctable_turn(game: &Game) -> Result<&Turn, GameError> {
    let turn = match (game.state, game.current_turn()) {
        (GamePhase::Guessing | GamePhase::Scoring, Some(turn)) => turn,
        _ => return Err(GameError::InactiveTurn),
    };
    if !turn.completed_by.is_empty() {
        return Err(GameError::UnexpectedState(
            "turn was already completed by a player".into(),
        ));
    }
    Ok(turn)
}

/// Validate the opening of a correction proposal.
pub fn check_proposal(
    game: &Game,
    user_id: &str,
    revision: TurnRevision,
    release_year: i32,
) -> Result<(), GameError> {
    let turn = correctable_turn(game)?;
    check_revision(turn, revision)?;
    game.player(user_id)?;

    if turn.open_proposal().is_some() {
        return Err(GameError::UnexpectedState(
            "a correction proposal is already open".into(),
        ));
    }
    if turn.track.release_year == release_year {
        return Err(GameError::Validation(format!(
            "track is already dated {release_year}"
        )));
    }
    Ok(())
}

/// Validate a vote on the open proposal.
pub fn check_vote(game: &Game, user_id: &str, revision: TurnRevision) -> Result<(), GameError> {
    let turn = correctable_turn(game)?;
    check_revision(turn, revision)?;
    game.player(user_id)?;

    let proposal = turn
        .open_proposal()
        .ok_or_else(|| GameError::NotFound("open correction proposal".into()))?;
    if proposal.votes.iter().any(|vote| vote.user_id == user_id) {
        return Err(GameError::AlreadyVoted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        state::game::CorrectionVote,
        test_support::guessing_game,
    };

    fn proposal(votes: &[(&str, bool)]) -> CorrectionProposal {
        CorrectionProposal {
            created_by: "alice".into(),
            created_at: SystemTime::UNIX_EPOCH,
            release_year: 1991,
            previous_release_year: 1990,
            state: CorrectionState::Voting,
            votes: votes
                .iter()
                .map(|(user_id, agree)| CorrectionVote {
                    user_id: user_id.to_string(),
                    agree: *agree,
                    created_at: SystemTime::UNIX_EPOCH,
                })
                .collect(),
        }
    }

    #[test]
    fn majority_thresholds() {
        assert_eq!(required_votes(1), 1);
        assert_eq!(required_votes(2), 1);
        assert_eq!(required_votes(3), 2);
        assert_eq!(required_votes(4), 2);
        assert_eq!(required_votes(5), 3);
    }

    #[test]
    fn two_agreeing_votes_out_of_four_accept() {
        let outcome = resolve(&proposal(&[("alice", true), ("bob", true)]), 4);
        assert_eq!(outcome, CorrectionState::Accepted);
    }

    #[test]
    fn rejection_once_acceptance_is_impossible() {
        assert_eq!(
            resolve(&proposal(&[("alice", false), ("bob", false)]), 4),
            CorrectionState::Voting
        );
        assert_eq!(
            resolve(
                &proposal(&[("alice", false), ("bob", false), ("carol", false)]),
                4
            ),
            CorrectionState::Rejected
        );
        assert_eq!(
            resolve(&proposal(&[("alice", false), ("bob", false)]), 3),
            CorrectionState::Rejected
        );
    }

    #[test]
    fn resolution_is_deterministic_for_a_vote_sequence() {
        let votes = [("alice", false), ("bob", false), ("carol", true), ("dave", false)];
        let states: Vec<_> = (1..=votes.len())
            .map(|count| resolve(&proposal(&votes[..count]), 5))
            .collect();
        assert_eq!(
            states,
            vec![
                CorrectionState::Voting,
                CorrectionState::Voting,
                CorrectionState::Voting,
                CorrectionState::Rejected,
            ]
        );
    }

    #[test]
    fn proposal_requires_a_different_year_and_no_open_vote() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        let revision = TurnRevision::initial();
        let year = game.current_turn().unwrap().track.release_year;

        assert!(matches!(
            check_proposal(&game, "bob", revision, year),
            Err(GameError::Validation(_))
        ));
        assert!(check_proposal(&game, "bob", revision, year + 1).is_ok());

        game.current_turn_mut().unwrap().correction_proposal = Some(proposal(&[]));
        assert!(matches!(
            check_proposal(&game, "bob", revision, year + 1),
            Err(GameError::UnexpectedState(_))
        ));
    }

    #[test]
    fn double_votes_and_completed_turns_are_rejected() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        let revision = TurnRevision::initial();
        game.current_turn_mut().unwrap().correction_proposal = Some(proposal(&[("bob", true)]));

        assert_eq!(check_vote(&game, "bob", revision), Err(GameError::AlreadyVoted));
        assert!(check_vote(&game, "alice", revision).is_ok());

        game.state = GamePhase::Scoring;
        game.current_turn_mut().unwrap().completed_by.push("alice".into());
        assert!(matches!(
            check_vote(&game, "alice", revision),
            Err(GameError::UnexpectedState(_))
        ));
    }
}

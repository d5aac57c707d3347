//! Admission checks for guesses and passes. Every check runs against the
//! current state before anything is mutated.

use crate::{
    config::RuleConstants,
    error::GameError,
    rules::ledger::{self, TokenAction},
    state::{
        game::{Game, Turn, TurnRevision},
        state_machine::GamePhase,
    },
};

/// Kind of guess being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessKind {
    /// Release-year guess placing the track at `position`.
    ReleaseYear {
        /// Index into the active player's timeline.
        position: usize,
    },
    /// Credits guess.
    Credits,
}

impl GuessKind {
    fn action(self) -> TokenAction {
        match self {
            GuessKind::ReleaseYear { .. } => TokenAction::ReleaseYearGuess,
            GuessKind::Credits => TokenAction::CreditsGuess,
        }
    }
}

/// The current turn, provided it still accepts guesses.
pub fn guessing_turn(game: &Game) -> Result<&Turn, GameError> {
    match (game.state, game.current_turn()) {
        (GamePhase::Guessing, Some(turn)) if turn.scoring.is_none() => Ok(turn),
        _ => Err(GameError::InactiveTurn),
    }
}

/// Reject requests computed against an older track.
pub fn check_revision(turn: &Turn, got: TurnRevision) -> Result<(), GameError> {
    if turn.revision == got {
        Ok(())
    } else {
        Err(GameError::StaleRevision {
            expected: turn.revision,
            got,
        })
    }
}

/// Validate a guess and return the token cost to debit.
pub fn check_guess(
    game: &Game,
    rules: &RuleConstants,
    user_id: &str,
    revision: TurnRevision,
    kind: GuessKind,
) -> Result<u32, GameError> {
    let turn = guessing_turn(game)?;
    check_revision(turn, revision)?;
    let player = game.player(user_id)?;

    if turn.has_passed(user_id) {
        return Err(GameError::AlreadyPassed);
    }

    let already_guessed = match kind {
        GuessKind::ReleaseYear { .. } => turn.release_year_guess_of(user_id).is_some(),
        GuessKind::Credits => turn.credits_guess_of(user_id).is_some(),
    };
    if already_guessed {
        return Err(GameError::AlreadyGuessed);
    }

    if let GuessKind::ReleaseYear { position } = kind {
        let max = game.player(&turn.active_user_id)?.timeline.len();
        if position > max {
            return Err(GameError::InvalidPosition { position, max });
        }
    }

    let is_active = turn.active_user_id == user_id;
    let cost = ledger::cost(rules, kind.action(), is_active);
    if player.tokens < cost {
        return Err(GameError::InsufficientTokens {
            required: cost,
            available: player.tokens,
        });
    }

    Ok(cost)
}

/// Validate a pass.
pub fn check_pass(game: &Game, user_id: &str, revision: TurnRevision) -> Result<(), GameError> {
    let turn = guessing_turn(game)?;
    check_revision(turn, revision)?;
    game.player(user_id)?;

    if turn.has_passed(user_id) {
        return Err(GameError::AlreadyPassed);
    }
    Ok(())
}

/// Validate a paid action of the active player (exchange or purchase) and
/// return its cost.
pub fn check_active_action(
    game: &Game,
    rules: &RuleConstants,
    user_id: &str,
    revision: TurnRevision,
    action: TokenAction,
) -> Result<u32, GameError> {
    let turn = guessing_turn(game)?;
    check_revision(turn, revision)?;
    let player = game.player(user_id)?;

    if turn.active_user_id != user_id {
        return Err(GameError::UnexpectedState(
            "only the active player may do this".into(),
        ));
    }
    if turn.has_passed(user_id) {
        return Err(GameError::AlreadyPassed);
    }

    let cost = ledger::cost(rules, action, true);
    if player.tokens < cost {
        return Err(GameError::InsufficientTokens {
            required: cost,
            available: player.tokens,
        });
    }
    Ok(cost)
}

/// Whether every current player passed the turn, the active player included.
/// The active player's pass only arms the countdown; scoring triggers once the
/// last remaining player passes.
pub fn everyone_passed(game: &Game, turn: &Turn) -> bool {
    game.players.keys().all(|user_id| turn.has_passed(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::guessing_game;

    fn rules() -> RuleConstants {
        RuleConstants::default()
    }

    #[test]
    fn stale_revision_wins_over_content_errors() {
        let game = guessing_game(&["alice", "bob"], 0);
        let err = check_guess(
            &game,
            &rules(),
            "bob",
            TurnRevision(7),
            GuessKind::ReleaseYear { position: 99 },
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::StaleRevision {
                expected: TurnRevision::initial(),
                got: TurnRevision(7),
            }
        );
    }

    #[test]
    fn challenger_pays_active_player_does_not() {
        let game = guessing_game(&["alice", "bob"], 0);
        let revision = TurnRevision::initial();
        let kind = GuessKind::ReleaseYear { position: 0 };

        assert_eq!(check_guess(&game, &rules(), "alice", revision, kind), Ok(0));
        assert_eq!(check_guess(&game, &rules(), "bob", revision, kind), Ok(1));
    }

    #[test]
    fn position_must_fit_active_timeline() {
        let game = guessing_game(&["alice", "bob"], 0);
        let err = check_guess(
            &game,
            &rules(),
            "bob",
            TurnRevision::initial(),
            GuessKind::ReleaseYear { position: 2 },
        )
        .unwrap_err();
        assert_eq!(err, GameError::InvalidPosition { position: 2, max: 1 });
    }

    #[test]
    fn broke_challenger_is_rejected() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        game.players["bob"].tokens = 0;
        let err = check_guess(
            &game,
            &rules(),
            "bob",
            TurnRevision::initial(),
            GuessKind::Credits,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientTokens {
                required: 1,
                available: 0,
            }
        );
    }

    #[test]
    fn passed_or_guessed_players_are_rejected() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        let now = std::time::SystemTime::UNIX_EPOCH;
        let turn = game.current_turn_mut().unwrap();
        turn.passes.push(crate::state::game::TurnPass {
            user_id: "bob".into(),
            created_at: now,
        });
        turn.credits_guesses.push(crate::state::game::CreditsGuess {
            created_at: now,
            user_id: "alice".into(),
            token_cost: 0,
            artists: vec!["x".into()],
            title: "y".into(),
        });
        let revision = TurnRevision::initial();

        assert_eq!(
            check_guess(&game, &rules(), "bob", revision, GuessKind::Credits),
            Err(GameError::AlreadyPassed)
        );
        assert_eq!(
            check_guess(&game, &rules(), "alice", revision, GuessKind::Credits),
            Err(GameError::AlreadyGuessed)
        );
        assert_eq!(check_pass(&game, "bob", revision), Err(GameError::AlreadyPassed));
        assert!(check_pass(&game, "alice", revision).is_ok());
    }

    #[test]
    fn everyone_passed_counts_the_active_player() {
        let mut game = guessing_game(&["alice", "bob", "carol"], 0);
        let now = std::time::SystemTime::UNIX_EPOCH;
        let turn = game.current_turn_mut().unwrap();
        for user in ["bob", "carol"] {
            turn.passes.push(crate::state::game::TurnPass {
                user_id: user.into(),
                created_at: now,
            });
        }
        assert!(!everyone_passed(&game, game.current_turn().unwrap()));

        game.current_turn_mut()
            .unwrap()
            .passes
            .push(crate::state::game::TurnPass {
                user_id: "alice".into(),
                created_at: now,
            });
        assert!(everyone_passed(&game, game.current_turn().unwrap()));
    }

    #[test]
    fn scored_turn_is_inactive() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        game.state = GamePhase::Scoring;
        assert_eq!(
            check_pass(&game, "bob", TurnRevision::initial()),
            Err(GameError::InactiveTurn)
        );
    }

    #[test]
    fn only_active_player_exchanges() {
        let game = guessing_game(&["alice", "bob"], 0);
        let revision = TurnRevision::initial();
        assert!(matches!(
            check_active_action(&game, &rules(), "bob", revision, TokenAction::TrackExchange),
            Err(GameError::UnexpectedState(_))
        ));
        assert_eq!(
            check_active_action(&game, &rules(), "alice", revision, TokenAction::TimelinePurchase),
            Err(GameError::InsufficientTokens {
                required: 3,
                available: 2,
            })
        );
        assert_eq!(
            check_active_action(&game, &rules(), "alice", revision, TokenAction::TrackExchange),
            Ok(1)
        );
    }
}

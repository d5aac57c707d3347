use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::game::{
    CorrectionProposal, CorrectionVote, CreditsGuess, Player, ReleaseYearGuess, Scoring, Track,
    Turn, TurnPass, TurnRevision, UserId,
};

/// Replacement of the current turn's track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackExchange {
    /// Turn whose track is replaced.
    pub turn_index: usize,
    /// Revision the turn carries after the exchange.
    pub revision: TurnRevision,
    /// Track the turn continues with.
    pub track: Track,
    /// Balance changes (exchange cost, refunds of voided guesses).
    pub token_deltas: IndexMap<UserId, i64>,
}

/// Terminal outcome of a correction proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// The year stays as it was.
    Rejected,
    /// The year is overwritten; `rescored` replaces the previous scoring when
    /// the turn had already been scored.
    Accepted {
        /// New scoring of the turn, `None` when it was not scored yet.
        rescored: Option<Scoring>,
    },
}

/// Every state change a game can go through. Applied exclusively by
/// [`crate::state::reducer::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A player entered the lobby.
    PlayerJoined {
        /// The new player, with their starting balance.
        player: Player,
    },
    /// A player left; their contributions to the current turn are dropped.
    PlayerLeft {
        /// The departing player.
        user_id: UserId,
        /// Turn replacing the current one when the leaver was the active player.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replacement_turn: Option<Turn>,
        /// Refunds owed to the remaining players.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        token_deltas: IndexMap<UserId, i64>,
    },
    /// The lobby closed and every player received a first track.
    GameStarted {
        /// Initial single-track timeline of each player.
        timelines: IndexMap<UserId, Track>,
        /// When the game master started the game.
        started_at: SystemTime,
    },
    /// The game master stopped the game.
    GameAborted {
        /// When the game was aborted.
        aborted_at: SystemTime,
    },
    /// A turn opened.
    NewTurn {
        /// The fresh turn, catch-up bonuses included.
        turn: Turn,
    },
    /// A player placed the turn's track.
    ReleaseYearGuessCreated {
        /// Turn the guess belongs to.
        turn_index: usize,
        /// Revision the guess was made against.
        revision: TurnRevision,
        /// The recorded guess.
        guess: ReleaseYearGuess,
    },
    /// A player named the turn's artists and title.
    CreditsGuessCreated {
        /// Turn the guess belongs to.
        turn_index: usize,
        /// Revision the guess was made against.
        revision: TurnRevision,
        /// The recorded guess.
        guess: CreditsGuess,
    },
    /// A player is done guessing on the turn.
    TurnPassed {
        /// Turn being passed.
        turn_index: usize,
        /// Revision the pass was made against.
        revision: TurnRevision,
        /// The recorded pass.
        pass: TurnPass,
    },
    /// The active player swapped the turn's track.
    TrackExchanged {
        /// The swap and its balance changes.
        exchange: TrackExchange,
    },
    /// The active player bought the turn's track.
    TrackBought {
        /// The buyer.
        user_id: UserId,
        /// The purchased track, inserted into the buyer's timeline.
        track: Track,
        /// Price paid.
        cost: u32,
        /// Fresh track replacing the purchased one.
        exchange: TrackExchange,
    },
    /// Guessing closed and the turn was scored.
    TurnScored {
        /// Scored turn.
        turn_index: usize,
        /// Winners and token gains.
        scoring: Scoring,
    },
    /// A player acknowledged the scoring.
    TurnCompleted {
        /// Completed turn.
        turn_index: usize,
        /// Player acknowledging.
        user_id: UserId,
    },
    /// A player reached the winning timeline length.
    GameCompleted {
        /// Every player at the winning length.
        winners: Vec<UserId>,
        /// When the game ended.
        completed_at: SystemTime,
    },
    /// A player disputed the turn's release year.
    CorrectionProposed {
        /// Turn under correction.
        turn_index: usize,
        /// The opened proposal.
        proposal: CorrectionProposal,
    },
    /// A player voted on the open proposal.
    CorrectionVoted {
        /// Turn under correction.
        turn_index: usize,
        /// The recorded vote.
        vote: CorrectionVote,
    },
    /// The vote reached a majority either way.
    CorrectionResolved {
        /// Turn under correction.
        turn_index: usize,
        /// Outcome, with the rescoring when accepted.
        outcome: CorrectionOutcome,
    },
}

impl GameEvent {
    /// Wire name of the event, also used as the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::PlayerLeft { .. } => "player_left",
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::GameAborted { .. } => "game_aborted",
            GameEvent::NewTurn { .. } => "new_turn",
            GameEvent::ReleaseYearGuessCreated { .. } => "release_year_guess_created",
            GameEvent::CreditsGuessCreated { .. } => "credits_guess_created",
            GameEvent::TurnPassed { .. } => "turn_passed",
            GameEvent::TrackExchanged { .. } => "track_exchanged",
            GameEvent::TrackBought { .. } => "track_bought",
            GameEvent::TurnScored { .. } => "turn_scored",
            GameEvent::TurnCompleted { .. } => "turn_completed",
            GameEvent::GameCompleted { .. } => "game_completed",
            GameEvent::CorrectionProposed { .. } => "correction_proposed",
            GameEvent::CorrectionVoted { .. } => "correction_voted",
            GameEvent::CorrectionResolved { .. } => "correction_resolved",
        }
    }
}

/// An event together with the game version it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Game the event belongs to.
    pub game_id: Uuid,
    /// Version of the game right after applying `event`.
    pub version: u64,
    /// The applied event.
    pub event: GameEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_event_type() {
        let event = GameEvent::TurnCompleted {
            turn_index: 3,
            user_id: "bob".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
        assert_eq!(value["turn_index"], 3);

        let aborted = GameEvent::GameAborted {
            aborted_at: SystemTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(&aborted).unwrap();
        assert_eq!(value["type"], aborted.event_type());
    }

    #[test]
    fn correction_outcome_is_tagged_by_state() {
        let value = serde_json::to_value(CorrectionOutcome::Accepted { rescored: None }).unwrap();
        assert_eq!(value["state"], "accepted");
        let back: CorrectionOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, CorrectionOutcome::Accepted { rescored: None });
    }
}

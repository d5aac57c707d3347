use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle states of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Lobby: players may join and leave freely.
    WaitingForPlayers,
    /// Initial timelines were dealt; the first turn is being created.
    Started,
    /// A turn is open for guesses and passes.
    Guessing,
    /// The current turn was scored and waits for every player to complete it.
    Scoring,
    /// A player reached the winning timeline length.
    Completed,
    /// The game master stopped the game.
    Aborted,
}

/// Events that drive the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Game master starts the game from the lobby.
    Start,
    /// A new turn was created (first turn, or after every player completed).
    TurnCreated,
    /// The scoring engine fired for the current turn.
    TurnScored,
    /// A player's timeline reached the winning length.
    Won,
    /// Game master aborts the game.
    Abort,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the game was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

impl GamePhase {
    /// Whether no further transition can leave this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Completed | GamePhase::Aborted)
    }

    /// Compute the phase reached by applying `event`, if the transition is valid.
    pub fn next(self, event: PhaseEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::WaitingForPlayers, PhaseEvent::Start) => GamePhase::Started,
            (GamePhase::Started, PhaseEvent::TurnCreated) => GamePhase::Guessing,
            (GamePhase::Guessing, PhaseEvent::TurnScored) => GamePhase::Scoring,
            (GamePhase::Scoring, PhaseEvent::TurnCreated) => GamePhase::Guessing,
            (GamePhase::Scoring, PhaseEvent::Won) => GamePhase::Completed,
            (from, PhaseEvent::Abort) if !from.is_terminal() => GamePhase::Aborted,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

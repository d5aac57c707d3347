use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{game::Game, state_machine::GamePhase};

/// Persisted form of a game: the full aggregate plus the columns a store
/// would index on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntity {
    /// Stable identifier for the game.
    pub id: Uuid,
    /// Number of events applied when the snapshot was taken.
    pub version: u64,
    /// Lifecycle phase at snapshot time.
    pub state: GamePhase,
    /// Last time the game was written.
    pub updated_at: SystemTime,
    /// Complete game state.
    pub game: Game,
}

impl From<&Game> for GameEntity {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            version: game.version,
            state: game.state,
            updated_at: SystemTime::now(),
            game: game.clone(),
        }
    }
}

impl From<GameEntity> for Game {
    fn from(entity: GameEntity) -> Self {
        entity.game
    }
}

/// In-process store.
pub mod memory;

use crate::dao::models::GameEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use self::memory::MemoryGameStore;

/// Abstraction over the persistence layer for games.
///
/// Atomic read-modify-write is provided by the per-game lock held by callers;
/// stores only need to refuse writes that would go back in version.
pub trait GameStore: Send + Sync {
    /// Persist the game, replacing any older version.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Check the store is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

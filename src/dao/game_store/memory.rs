use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{StorageError, StorageResult},
};

/// Process-local [`GameStore`]. Games survive as long as the process does.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<Uuid, GameEntity>>,
    offline: Arc<AtomicBool>,
}

impl MemoryGameStore {
    /// Empty store, online.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until the store is back online.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::offline("in-memory store is offline"))
        } else {
            Ok(())
        }
    }

    fn write(&self, game: GameEntity) -> StorageResult<()> {
        self.ensure_online()?;
        if let Some(stored) = self.games.get(&game.id) {
            if stored.version > game.version {
                return Err(StorageError::VersionConflict {
                    id: game.id,
                    stored: stored.version,
                    attempted: game.version,
                });
            }
        }
        self.games.insert(game.id, game);
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(game);
        async move { result }.boxed()
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let result = self
            .ensure_online()
            .map(|()| self.games.get(&id).map(|entry| entry.value().clone()));
        async move { result }.boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        async move { result }.boxed()
    }
}

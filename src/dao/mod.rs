/// Track catalog collaborator.
pub mod catalog;
/// Game state storage and retrieval operations.
pub mod game_store;
/// Persisted model definitions.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;

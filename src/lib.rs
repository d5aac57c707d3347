//! Library crate for hit-timeline-back, exposing the game engine, its HTTP
//! surface and the event-stream client to the binaries and tests.

pub mod config;
/// Storage and catalog collaborators.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Rule violations and service failures.
pub mod error;
/// HTTP route trees.
pub mod routes;
pub mod rules;
/// Commands and queries on top of the shared state.
pub mod services;
/// Game model, events and in-memory game registry.
pub mod state;
pub mod sync;

#[cfg(test)]
mod test_support;

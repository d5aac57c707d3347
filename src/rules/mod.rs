//! Pure game rules. Nothing in here performs I/O or mutates a [`Game`].
//!
//! [`Game`]: crate::state::game::Game

/// Bonus tokens for trailing players.
pub mod catch_up;
/// Correction proposal checks and vote tallying.
pub mod correction;
/// Artist and title matching.
pub mod credits;
/// Token prices, refunds and balance bounds.
pub mod ledger;
/// Turn scoring.
pub mod scoring;
/// Sorted timeline operations.
pub mod timeline;
/// Command preconditions.
pub mod validator;

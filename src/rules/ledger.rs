//! Token costs, refunds and reward capping. Pure functions, no state.

use indexmap::IndexMap;

use crate::{
    config::RuleConstants,
    state::game::{Guess, TokenGain, Turn, UserId},
};

/// Token-consuming actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// Placing the track, with an optional exact year.
    ReleaseYearGuess,
    /// Naming artists and title.
    CreditsGuess,
    /// Swapping the turn's track.
    TrackExchange,
    /// Buying the turn's track into one's own timeline.
    TimelinePurchase,
}

/// Scored aspects of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aspect {
    /// Placement in the active player's timeline.
    Position,
    /// Exact release year.
    Year,
    /// Artists and title.
    Credits,
}

impl Aspect {
    /// Year rides on the release-year guess's cost and credits have no refund
    /// concept, so only the position aspect gives costs back.
    pub fn ignores_cost(self) -> bool {
        !matches!(self, Aspect::Position)
    }
}

/// Refund/reward split of a raw gain before capping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Paid cost given back.
    pub refund: u32,
    /// Tokens earned on top of the refund.
    pub reward: u32,
}

/// Price of `action` for a player. The active player guesses for free.
pub fn cost(rules: &RuleConstants, action: TokenAction, is_active_player: bool) -> u32 {
    match action {
        TokenAction::ReleaseYearGuess if is_active_player => 0,
        TokenAction::CreditsGuess if is_active_player => 0,
        TokenAction::ReleaseYearGuess => rules.release_year_guess_cost,
        TokenAction::CreditsGuess => rules.credits_guess_cost,
        TokenAction::TrackExchange => rules.exchange_cost,
        TokenAction::TimelinePurchase => rules.timeline_purchase_cost,
    }
}

/// Split the raw gain of a guess into refund and reward.
///
/// Negative raw gains are floored at zero. The paid cost is refunded only when
/// the raw gain covers it entirely.
pub fn settle(aspect: Aspect, guess: &impl Guess, raw_gain: i64) -> Settlement {
    let raw = u32::try_from(raw_gain.max(0)).unwrap_or(u32::MAX);
    let paid = guess.token_cost();
    let refund = if aspect.ignores_cost() || raw < paid {
        0
    } else {
        paid.min(raw)
    };

    Settlement {
        refund,
        reward: raw - refund,
    }
}

/// Cap the reward so `balance + refund + reward` never exceeds `max_tokens`.
pub fn clamp(balance: u32, max_tokens: u32, settlement: Settlement) -> TokenGain {
    let room = max_tokens.saturating_sub(balance.saturating_add(settlement.refund));
    TokenGain {
        refund: settlement.refund,
        reward_theoretical: settlement.reward,
        reward_effective: settlement.reward.min(room),
    }
}

/// Add `delta` to a balance while staying in `0..=max_tokens`.
pub fn apply_delta(balance: u32, delta: i64, max_tokens: u32) -> u32 {
    let next = i64::from(balance).saturating_add(delta);
    next.clamp(0, i64::from(max_tokens)) as u32
}

/// Balance changes caused by swapping the turn's track: the requester pays
/// `cost` and, when `refund_voided` is set, every voided guess is paid back.
pub fn exchange_deltas(
    turn: &Turn,
    requester: &str,
    cost: u32,
    refund_voided: bool,
) -> IndexMap<UserId, i64> {
    let mut deltas: IndexMap<UserId, i64> = IndexMap::new();
    if refund_voided {
        for (user_id, paid) in turn.paid_costs() {
            deltas.insert(user_id, i64::from(paid));
        }
    }
    if cost > 0 {
        *deltas.entry(requester.to_string()).or_default() -= i64::from(cost);
    }
    deltas.retain(|_, delta| *delta != 0);
    deltas
}

//! Turn outcome computation. Scoring is pure: it reads the game and returns a
//! [`Scoring`] that the reducer applies (and can later revert).

use indexmap::IndexMap;

use crate::{
    config::RuleConstants,
    rules::{
        credits::CreditsMatcher,
        ledger::{self, Aspect},
        timeline,
    },
    state::game::{AspectScoring, Game, Guess, ReleaseYearGuess, Scoring, TokenGain, Turn, UserId},
};

/// Compute the outcome of `turn` against the current timelines and balances.
///
/// Guesses of players who left the game are ignored. Gains are capped with a
/// running balance per player, aspect after aspect (position, year, credits),
/// so the summed credit never pushes anyone past `max_tokens`.
pub fn score_turn(game: &Game, turn: &Turn, rules: &RuleConstants) -> Scoring {
    let mut balances: IndexMap<UserId, u32> = game
        .players
        .iter()
        .map(|(user_id, player)| (user_id.clone(), player.tokens))
        .collect();
    let max_tokens = game.settings.max_tokens;
    let active_timeline = game
        .players
        .get(&turn.active_user_id)
        .map(|player| player.timeline.as_slice())
        .unwrap_or_default();

    let release_guesses = chronological(game, &turn.release_year_guesses);
    let is_placed = |guess: &ReleaseYearGuess| {
        timeline::is_position_correct(active_timeline, &turn.track, guess.position)
    };

    let active_correct = release_guesses
        .iter()
        .any(|guess| guess.user_id == turn.active_user_id && is_placed(*guess));
    let mut placed: Vec<UserId> = release_guesses
        .iter()
        .filter(|guess| guess.user_id != turn.active_user_id && is_placed(*guess))
        .map(|guess| guess.user_id.clone())
        .collect();
    let position_winner = if active_correct {
        Some(turn.active_user_id.clone())
    } else {
        placed.first().cloned()
    };
    if active_correct {
        placed.insert(0, turn.active_user_id.clone());
    }
    let position = AspectScoring {
        winner: position_winner,
        correct_guesses: placed,
        token_gains: settle_aspect(
            Aspect::Position,
            &release_guesses,
            is_placed,
            rules.position_reward,
            &mut balances,
            max_tokens,
        ),
    };

    let year_guesses: Vec<&ReleaseYearGuess> = release_guesses
        .iter()
        .copied()
        .filter(|guess| guess.year.is_some())
        .collect();
    let year = score_aspect(
        Aspect::Year,
        &year_guesses,
        |guess| guess.year == Some(turn.track.release_year),
        rules.year_reward,
        &mut balances,
        max_tokens,
    );

    let matcher = CreditsMatcher::from(&game.settings);
    let credits_guesses = chronological(game, &turn.credits_guesses);
    let credits = score_aspect(
        Aspect::Credits,
        &credits_guesses,
        |guess| matcher.is_correct(guess, &turn.track),
        rules.credits_reward,
        &mut balances,
        max_tokens,
    );

    Scoring {
        position,
        year,
        credits,
    }
}

/// Aspect where every correct guesser is listed and the earliest one wins.
fn score_aspect<G: Guess>(
    aspect: Aspect,
    guesses: &[&G],
    is_correct: impl Fn(&G) -> bool,
    reward: u32,
    balances: &mut IndexMap<UserId, u32>,
    max_tokens: u32,
) -> AspectScoring {
    let correct_guesses: Vec<UserId> = guesses
        .iter()
        .filter(|guess| is_correct(**guess))
        .map(|guess| guess.user_id().to_string())
        .collect();

    AspectScoring {
        winner: correct_guesses.first().cloned(),
        token_gains: settle_aspect(aspect, guesses, is_correct, reward, balances, max_tokens),
        correct_guesses,
    }
}

fn settle_aspect<G: Guess>(
    aspect: Aspect,
    guesses: &[&G],
    is_correct: impl Fn(&G) -> bool,
    reward: u32,
    balances: &mut IndexMap<UserId, u32>,
    max_tokens: u32,
) -> IndexMap<UserId, TokenGain> {
    guesses
        .iter()
        .map(|guess| {
            let raw_gain = if is_correct(*guess) { i64::from(reward) } else { 0 };
            let balance = balances.get(guess.user_id()).copied().unwrap_or_default();
            let gain = ledger::clamp(balance, max_tokens, ledger::settle(aspect, *guess, raw_gain));
            balances.insert(guess.user_id().to_string(), balance + gain.credited());
            (guess.user_id().to_string(), gain)
        })
        .collect()
}

/// Guesses of current players, oldest first. Ties keep submission order.
fn chronological<'a, G: Guess>(game: &Game, guesses: &'a [G]) -> Vec<&'a G> {
    let mut ordered: Vec<&G> = guesses
        .iter()
        .filter(|guess| game.players.contains_key(guess.user_id()))
        .collect();
    ordered.sort_by_key(|guess| guess.created_at());
    ordered
}

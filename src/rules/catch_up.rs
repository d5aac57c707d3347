use indexmap::IndexMap;

use crate::{
    config::RuleConstants,
    state::game::{Game, UserId},
};

/// Bonus tokens granted at turn start to players trailing the timeline leader.
///
/// Each player earns one token per `catch_up_gap` tracks behind the leader,
/// capped so the balance stays within `max_tokens`. Zero gains are omitted.
pub fn catch_up_gains(game: &Game, rules: &RuleConstants) -> IndexMap<UserId, u32> {
    if !game.settings.enable_catch_up || rules.catch_up_gap == 0 {
        return IndexMap::new();
    }

    let leader = game
        .players
        .values()
        .map(|player| player.timeline.len())
        .max()
        .unwrap_or_default();

    game.players
        .values()
        .filter_map(|player| {
            let behind = leader - player.timeline.len();
            let earned = u32::try_from(behind / rules.catch_up_gap).unwrap_or(u32::MAX);
            let room = game.settings.max_tokens.saturating_sub(player.tokens);
            let gain = earned.min(room);
            (gain > 0).then(|| (player.user_id.clone(), gain))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{guessing_game, track};

    fn grow(game: &mut Game, user_id: &str, extra: usize) {
        let player = &mut game.players[user_id];
        for index in 0..extra {
            player.timeline.push(track(&format!("{user_id}-{index}"), 2000));
        }
    }

    #[test]
    fn trailing_players_earn_per_gap() {
        let mut game = guessing_game(&["alice", "bob", "carol"], 0);
        grow(&mut game, "alice", 5);
        grow(&mut game, "bob", 2);

        let gains = catch_up_gains(&game, &RuleConstants::default());

        assert_eq!(gains.get("alice"), None);
        assert_eq!(gains.get("bob"), Some(&1));
        assert_eq!(gains.get("carol"), Some(&2));
    }

    #[test]
    fn gains_respect_max_tokens_and_flag() {
        let mut game = guessing_game(&["alice", "bob"], 0);
        grow(&mut game, "alice", 8);
        game.players["bob"].tokens = game.settings.max_tokens - 1;

        let gains = catch_up_gains(&game, &RuleConstants::default());
        assert_eq!(gains.get("bob"), Some(&1));

        game.settings.enable_catch_up = false;
        assert!(catch_up_gains(&game, &RuleConstants::default()).is_empty());
    }
}

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::GameError, state::state_machine::GamePhase};

/// Identifier of a user as resolved by the session collaborator.
pub type UserId = String;

/// Fencing token of a turn. Bumped whenever the turn's track changes so stale
/// guesses and votes can be rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TurnRevision(pub u32);

impl TurnRevision {
    /// Revision carried by the very first turn of a game.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Revision following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TurnRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable catalog track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Track {
    /// Catalog identifier.
    pub id: String,
    /// Track title as published.
    pub title: String,
    /// Credited artists, main artist first.
    pub artists: Vec<String>,
    /// Year the track was first released.
    pub release_year: i32,
    /// Optional cover artwork reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
}

/// How guessed artists are compared against the credited ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtistsMatchMode {
    /// Every credited artist must be named and every named artist must be credited.
    All,
    /// At least one named artist must be credited.
    #[default]
    One,
}

/// How the guessed title is compared against the actual one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TitleMatchMode {
    /// Compare the complete titles.
    Full,
    /// Ignore bracketed, parenthesised and dash-separated suffixes.
    #[default]
    Main,
}

/// Settings fixed at game creation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GameSettings {
    /// Playlists tracks are drawn from.
    pub playlist_ids: Vec<String>,
    /// Tokens each player starts with.
    pub initial_tokens: u32,
    /// Upper bound of any token balance.
    pub max_tokens: u32,
    /// Timeline length that ends the game.
    pub timeline_length: usize,
    /// Artist comparison strictness for credits guesses.
    pub artists_match_mode: ArtistsMatchMode,
    /// Title comparison strictness for credits guesses.
    pub title_match_mode: TitleMatchMode,
    /// Minimal similarity (0..=1) for a credits value to be accepted.
    pub credits_similarity_threshold: f64,
    /// Drop common stop-words before comparing credits.
    pub remove_stop_words: bool,
    /// Countdown started once the active player has passed.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[schema(value_type = u64)]
    pub guess_timeout: Duration,
    /// Grant catch-up tokens to trailing players at turn start.
    pub enable_catch_up: bool,
}

/// A participant of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Identity resolved by the session collaborator.
    pub user_id: UserId,
    /// The creator of the game; may start and abort it but never leave.
    pub is_game_master: bool,
    /// Current balance, `0..=max_tokens`.
    pub tokens: u32,
    /// Won tracks sorted ascending by release year.
    pub timeline: Vec<Track>,
    /// When the player entered the lobby.
    #[schema(value_type = String)]
    pub joined_at: SystemTime,
}

/// Behaviour shared by every guess kind.
pub trait Guess {
    /// Player who submitted the guess.
    fn user_id(&self) -> &str;
    /// Submission time, used to break ties between correct guessers.
    fn created_at(&self) -> SystemTime;
    /// Tokens debited at submission.
    fn token_cost(&self) -> u32;
}

/// Placement of the turn's track into the active player's timeline, with an
/// optional exact year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReleaseYearGuess {
    /// Submission time.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
    /// Guessing player.
    pub user_id: UserId,
    /// Tokens debited at submission.
    pub token_cost: u32,
    /// Index into the active player's timeline.
    pub position: usize,
    /// Exact year, when the player risked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Guess of the turn's artists and title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreditsGuess {
    /// Submission time.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
    /// Guessing player.
    pub user_id: UserId,
    /// Tokens debited at submission.
    pub token_cost: u32,
    /// Guessed artist names.
    pub artists: Vec<String>,
    /// Guessed title.
    pub title: String,
}

impl Guess for ReleaseYearGuess {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }

    fn token_cost(&self) -> u32 {
        self.token_cost
    }
}

impl Guess for CreditsGuess {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }

    fn token_cost(&self) -> u32 {
        self.token_cost
    }
}

/// A player declining to guess (any more) this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TurnPass {
    /// Passing player.
    pub user_id: UserId,
    /// When the player passed.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
}

/// Tokens credited to one player for one scoring aspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenGain {
    /// Part of the paid guess cost given back.
    pub refund: u32,
    /// Reward before capping at `max_tokens`, for display.
    pub reward_theoretical: u32,
    /// Reward actually credited.
    pub reward_effective: u32,
}

impl TokenGain {
    /// Tokens this gain moves into the player's balance.
    pub fn credited(&self) -> u32 {
        self.refund + self.reward_effective
    }
}

/// Outcome of a single aspect (position, year or credits).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AspectScoring {
    /// Earliest correct guesser, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<UserId>,
    /// Every correct guesser, earliest first.
    pub correct_guesses: Vec<UserId>,
    /// Refunds and rewards per player.
    #[schema(value_type = HashMap<String, TokenGain>)]
    pub token_gains: IndexMap<UserId, TokenGain>,
}

/// Complete outcome of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Scoring {
    /// Placement in the active player's timeline.
    pub position: AspectScoring,
    /// Exact release year.
    pub year: AspectScoring,
    /// Artists and title.
    pub credits: AspectScoring,
}

impl Scoring {
    /// Tokens credited per player, summed across aspects.
    pub fn credited(&self) -> IndexMap<UserId, u32> {
        let mut totals: IndexMap<UserId, u32> = IndexMap::new();
        for aspect in [&self.position, &self.year, &self.credits] {
            for (user_id, gain) in &aspect.token_gains {
                *totals.entry(user_id.clone()).or_default() += gain.credited();
            }
        }
        totals
    }
}

/// Lifecycle of a correction proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionState {
    /// Votes are still being collected.
    Voting,
    /// A majority agreed; the year was changed.
    Accepted,
    /// A majority disagreed.
    Rejected,
}

/// One player's opinion on a correction proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionVote {
    /// Voting player.
    pub user_id: UserId,
    /// Whether the player accepts the corrected year.
    pub agree: bool,
    /// When the vote was cast.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
}

/// Player-raised request to change the release year of the turn's track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionProposal {
    /// Proposing player.
    pub created_by: UserId,
    /// When the proposal was opened.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
    /// Year the track should carry once accepted.
    pub release_year: i32,
    /// Year the track carried when the proposal was opened.
    pub previous_release_year: i32,
    /// Where the vote stands.
    pub state: CorrectionState,
    /// Votes cast so far; the proposer does not vote implicitly.
    pub votes: Vec<CorrectionVote>,
}

impl CorrectionProposal {
    /// Number of agreeing and disagreeing votes.
    pub fn tally(&self) -> (usize, usize) {
        let agree = self.votes.iter().filter(|vote| vote.agree).count();
        (agree, self.votes.len() - agree)
    }

    /// Whether votes are still accepted.
    pub fn is_open(&self) -> bool {
        self.state == CorrectionState::Voting
    }
}

/// One guessing round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    /// Position of the turn in the game.
    pub index: usize,
    /// Bumped whenever the track changes.
    pub revision: TurnRevision,
    /// When the turn opened.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
    /// Player who must place the track.
    pub active_user_id: UserId,
    /// Track being guessed.
    pub track: Track,
    /// Bonus tokens credited to trailing players when the turn started.
    #[schema(value_type = HashMap<String, u32>)]
    pub catch_up_token_gain: IndexMap<UserId, u32>,
    /// Placements made against the current revision.
    pub release_year_guesses: Vec<ReleaseYearGuess>,
    /// Credits guesses made against the current revision.
    pub credits_guesses: Vec<CreditsGuess>,
    /// Players done guessing.
    pub passes: Vec<TurnPass>,
    /// Set once the turn was scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<Scoring>,
    /// Latest correction proposal, open or resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_proposal: Option<CorrectionProposal>,
    /// Players who acknowledged the scoring.
    pub completed_by: Vec<UserId>,
}

impl Turn {
    /// Fresh turn without any guesses.
    pub fn new(
        index: usize,
        revision: TurnRevision,
        active_user_id: UserId,
        track: Track,
        catch_up_token_gain: IndexMap<UserId, u32>,
        created_at: SystemTime,
    ) -> Self {
        Self {
            index,
            revision,
            created_at,
            active_user_id,
            track,
            catch_up_token_gain,
            release_year_guesses: Vec::new(),
            credits_guesses: Vec::new(),
            passes: Vec::new(),
            scoring: None,
            correction_proposal: None,
            completed_by: Vec::new(),
        }
    }

    /// Release-year guess of `user_id`, if any.
    pub fn release_year_guess_of(&self, user_id: &str) -> Option<&ReleaseYearGuess> {
        self.release_year_guesses
            .iter()
            .find(|guess| guess.user_id == user_id)
    }

    /// Credits guess of `user_id`, if any.
    pub fn credits_guess_of(&self, user_id: &str) -> Option<&CreditsGuess> {
        self.credits_guesses
            .iter()
            .find(|guess| guess.user_id == user_id)
    }

    /// Whether `user_id` passed the turn.
    pub fn has_passed(&self, user_id: &str) -> bool {
        self.passes.iter().any(|pass| pass.user_id == user_id)
    }

    /// Whether `user_id` acknowledged the scoring.
    pub fn has_completed(&self, user_id: &str) -> bool {
        self.completed_by.iter().any(|id| id == user_id)
    }

    /// Open correction proposal, if any.
    pub fn open_proposal(&self) -> Option<&CorrectionProposal> {
        self.correction_proposal
            .as_ref()
            .filter(|proposal| proposal.is_open())
    }

    /// Tokens paid by each player for the guesses currently recorded.
    pub fn paid_costs(&self) -> IndexMap<UserId, u32> {
        let mut paid: IndexMap<UserId, u32> = IndexMap::new();
        let costs = self
            .release_year_guesses
            .iter()
            .map(|guess| (&guess.user_id, guess.token_cost))
            .chain(
                self.credits_guesses
                    .iter()
                    .map(|guess| (&guess.user_id, guess.token_cost)),
            );
        for (user_id, cost) in costs {
            if cost > 0 {
                *paid.entry(user_id.clone()).or_default() += cost;
            }
        }
        paid
    }

    /// Drop everything a player contributed to this turn.
    pub fn forget_player(&mut self, user_id: &str) {
        self.release_year_guesses
            .retain(|guess| guess.user_id != user_id);
        self.credits_guesses.retain(|guess| guess.user_id != user_id);
        self.passes.retain(|pass| pass.user_id != user_id);
        self.completed_by.retain(|id| id != user_id);
        if let Some(proposal) = self
            .correction_proposal
            .as_mut()
            .filter(|proposal| proposal.is_open())
        {
            proposal.votes.retain(|vote| vote.user_id != user_id);
        }
    }
}

/// Authoritative aggregate of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Game {
    /// Stable identifier.
    pub id: Uuid,
    /// When the lobby was opened.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
    /// Number of events applied so far.
    pub version: u64,
    /// Settings fixed at creation.
    pub settings: GameSettings,
    /// Lifecycle phase.
    pub state: GamePhase,
    /// Players in join order; the order drives active-player rotation.
    #[schema(value_type = HashMap<String, Player>)]
    pub players: IndexMap<UserId, Player>,
    /// Every turn played, the current one last.
    pub turns: Vec<Turn>,
}

impl Game {
    /// New game waiting for players, with its creator as game master.
    pub fn new(settings: GameSettings, game_master: UserId, created_at: SystemTime) -> Self {
        let mut players = IndexMap::new();
        let master = Player {
            user_id: game_master.clone(),
            is_game_master: true,
            tokens: settings.initial_tokens,
            timeline: Vec::new(),
            joined_at: created_at,
        };
        players.insert(game_master, master);

        Self {
            id: Uuid::new_v4(),
            created_at,
            version: 0,
            settings,
            state: GamePhase::WaitingForPlayers,
            players,
            turns: Vec::new(),
        }
    }

    /// Player `user_id`, or a not-found error.
    pub fn player(&self, user_id: &str) -> Result<&Player, GameError> {
        self.players
            .get(user_id)
            .ok_or_else(|| GameError::NotFound(format!("player `{user_id}`")))
    }

    /// Latest turn, whatever its phase.
    pub fn current_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Mutable access to the latest turn.
    pub fn current_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut()
    }

    /// Track ids already drawn in this game.
    pub fn used_track_ids(&self) -> HashSet<String> {
        self.players
            .values()
            .flat_map(|player| player.timeline.iter())
            .chain(self.turns.iter().map(|turn| &turn.track))
            .map(|track| track.id.clone())
            .collect()
    }

    /// Player following `user_id` in join order, wrapping around.
    pub fn next_player_after(&self, user_id: &str) -> Option<&UserId> {
        let index = self.players.get_index_of(user_id)?;
        self.players
            .get_index((index + 1) % self.players.len())
            .map(|(id, _)| id)
    }

    /// Players whose timeline reached the winning length.
    pub fn winners(&self) -> Vec<UserId> {
        self.players
            .values()
            .filter(|player| player.timeline.len() >= self.settings.timeline_length)
            .map(|player| player.user_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{settings, track};

    #[test]
    fn next_player_wraps_around() {
        let now = SystemTime::UNIX_EPOCH;
        let mut game = Game::new(settings(), "alice".into(), now);
        for user in ["bob", "carol"] {
            game.players.insert(
                user.into(),
                Player {
                    user_id: user.into(),
                    is_game_master: false,
                    tokens: 2,
                    timeline: Vec::new(),
                    joined_at: now,
                },
            );
        }

        assert_eq!(game.next_player_after("alice").map(String::as_str), Some("bob"));
        assert_eq!(game.next_player_after("carol").map(String::as_str), Some("alice"));
        assert_eq!(game.next_player_after("dave"), None);
    }

    #[test]
    fn forget_player_keeps_terminal_votes() {
        let now = SystemTime::UNIX_EPOCH;
        let mut turn = Turn::new(
            0,
            TurnRevision::initial(),
            "alice".into(),
            track("t1", 1990),
            IndexMap::new(),
            now,
        );
        turn.passes.push(TurnPass {
            user_id: "bob".into(),
            created_at: now,
        });
        turn.correction_proposal = Some(CorrectionProposal {
            created_by: "bob".into(),
            created_at: now,
            release_year: 1991,
            previous_release_year: 1990,
            state: CorrectionState::Rejected,
            votes: vec![CorrectionVote {
                user_id: "bob".into(),
                agree: true,
                created_at: now,
            }],
        });

        turn.forget_player("bob");

        assert!(!turn.has_passed("bob"));
        assert_eq!(turn.correction_proposal.unwrap().votes.len(), 1);
    }

    #[test]
    fn scoring_credited_sums_aspects() {
        let mut scoring = Scoring::default();
        scoring.position.token_gains.insert(
            "bob".into(),
            TokenGain {
                refund: 1,
                reward_theoretical: 1,
                reward_effective: 1,
            },
        );
        scoring.year.token_gains.insert(
            "bob".into(),
            TokenGain {
                refund: 0,
                reward_theoretical: 2,
                reward_effective: 1,
            },
        );

        assert_eq!(scoring.credited().get("bob"), Some(&3));
    }
}

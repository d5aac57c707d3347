use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{validate_artist_names, validate_not_blank},
    state::{
        events::EventEnvelope,
        game::{ArtistsMatchMode, GameSettings, TitleMatchMode, TurnRevision},
    },
};

/// Payload used to open a new game lobby. Omitted fields fall back to the
/// configured defaults.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_token_bounds"))]
pub struct CreateGameRequest {
    /// Playlists tracks are drawn from.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub playlist_ids: Option<Vec<String>>,
    /// Balance of every player when the game starts.
    #[serde(default)]
    pub initial_tokens: Option<u32>,
    /// Cap on any player's balance.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
    /// Timeline length that wins the game.
    #[serde(default)]
    #[validate(range(min = 2, max = 100))]
    pub timeline_length: Option<usize>,
    /// How many artists a credits guess must name.
    #[serde(default)]
    pub artists_match_mode: Option<ArtistsMatchMode>,
    /// Which part of the title is compared.
    #[serde(default)]
    pub title_match_mode: Option<TitleMatchMode>,
    /// Minimum similarity for two names to match.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub credits_similarity_threshold: Option<f64>,
    /// Ignore common words when comparing names.
    #[serde(default)]
    pub remove_stop_words: Option<bool>,
    /// Countdown after the active player's pass, in seconds.
    #[serde(default)]
    #[validate(range(min = 1, max = 600))]
    pub guess_timeout_secs: Option<u64>,
    /// Grant bonus tokens to trailing players at each turn.
    #[serde(default)]
    pub enable_catch_up: Option<bool>,
}

fn validate_token_bounds(request: &CreateGameRequest) -> Result<(), ValidationError> {
    match (request.initial_tokens, request.max_tokens) {
        (Some(initial), Some(max)) if initial > max => {
            let mut err = ValidationError::new("token_bounds");
            err.message = Some("initial_tokens must not exceed max_tokens".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl CreateGameRequest {
    /// Resolve the requested settings on top of `defaults`.
    pub fn into_settings(self, defaults: &GameSettings) -> GameSettings {
        let max_tokens = self.max_tokens.unwrap_or(defaults.max_tokens);
        GameSettings {
            playlist_ids: self
                .playlist_ids
                .unwrap_or_else(|| defaults.playlist_ids.clone()),
            initial_tokens: self
                .initial_tokens
                .unwrap_or(defaults.initial_tokens)
                .min(max_tokens),
            max_tokens,
            timeline_length: self.timeline_length.unwrap_or(defaults.timeline_length),
            artists_match_mode: self
                .artists_match_mode
                .unwrap_or(defaults.artists_match_mode),
            title_match_mode: self.title_match_mode.unwrap_or(defaults.title_match_mode),
            credits_similarity_threshold: self
                .credits_similarity_threshold
                .unwrap_or(defaults.credits_similarity_threshold),
            remove_stop_words: self.remove_stop_words.unwrap_or(defaults.remove_stop_words),
            guess_timeout: self
                .guess_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.guess_timeout),
            enable_catch_up: self.enable_catch_up.unwrap_or(defaults.enable_catch_up),
        }
    }
}

/// Placement (and optional exact year) of the turn's track.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReleaseYearGuessRequest {
    /// Revision of the turn the guess was made against.
    pub revision: TurnRevision,
    /// Index into the active player's timeline.
    pub position: usize,
    /// Exact release year, for the year bonus.
    #[serde(default)]
    #[validate(range(min = 1000, max = 2999))]
    pub year: Option<i32>,
}

/// Guessed artists and title of the turn's track.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditsGuessRequest {
    /// Revision of the turn the guess was made against.
    pub revision: TurnRevision,
    /// Guessed artist names.
    pub artists: Vec<String>,
    /// Guessed title.
    pub title: String,
}

impl Validate for CreditsGuessRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.artists.is_empty() {
            errors.add("artists", ValidationError::new("artists_empty"));
        } else if let Err(e) = validate_artist_names(&self.artists) {
            errors.add("artists", e);
        }

        if let Err(e) = validate_not_blank(&self.title) {
            errors.add("title", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of the actions that only need the caller's view of the turn
/// (pass, exchange, buy).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RevisionRequest {
    /// Revision of the turn as the caller last saw it.
    pub revision: TurnRevision,
}

/// Opening of a release-year correction vote.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CorrectionRequest {
    /// Revision of the turn being corrected.
    pub revision: TurnRevision,
    /// Release year the proposer believes is right.
    #[validate(range(min = 1000, max = 2999))]
    pub release_year: i32,
}

/// Vote on the open correction proposal.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CorrectionVoteRequest {
    /// Revision of the turn under correction.
    pub revision: TurnRevision,
    /// Whether the voter accepts the corrected year.
    pub agree: bool,
}

/// Result of a mutating command: the events it produced, in order. The same
/// envelopes are pushed to every subscriber of the game.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    /// Game the command ran against.
    pub game_id: Uuid,
    /// Game version after the last event.
    pub version: u64,
    /// RFC 3339 time the response was built.
    pub applied_at: String,
    /// Produced events, oldest first.
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<EventEnvelope>,
}

impl CommandResponse {
    /// Wrap the events a command produced.
    pub fn new(game_id: Uuid, events: Vec<EventEnvelope>) -> Self {
        Self {
            game_id,
            version: events.last().map_or(0, |envelope| envelope.version),
            applied_at: OffsetDateTime::from(SystemTime::now())
                .format(&Rfc3339)
                .unwrap_or_default(),
            events,
        }
    }
}

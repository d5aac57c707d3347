//! Application-level configuration loading: rule constants, new-game defaults,
//! the seed track catalog and client reconnect bounds.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::game::{ArtistsMatchMode, GameSettings, TitleMatchMode, Track};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HIT_TIMELINE_BACK_CONFIG_PATH";

/// Token costs and rewards shared by every game served by this process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleConstants {
    /// Price of a release-year guess for a non-active player.
    pub release_year_guess_cost: u32,
    /// Price of a credits guess for a non-active player.
    pub credits_guess_cost: u32,
    /// Price the active player pays to swap the turn's track.
    pub exchange_cost: u32,
    /// Price the active player pays to take the turn's track into their timeline.
    pub timeline_purchase_cost: u32,
    /// Raw gain of a correct placement.
    pub position_reward: u32,
    /// Raw gain of an exact release year.
    pub year_reward: u32,
    /// Raw gain of correct credits.
    pub credits_reward: u32,
    /// Timeline tracks behind the leader per catch-up token.
    pub catch_up_gap: usize,
    /// Players required to start a game.
    pub min_players: usize,
    /// Give voided guess costs back when the turn's track changes.
    pub refund_voided_guesses: bool,
}

impl Default for RuleConstants {
    fn default() -> Self {
        Self {
            release_year_guess_cost: 1,
            credits_guess_cost: 1,
            exchange_cost: 1,
            timeline_purchase_cost: 3,
            position_reward: 1,
            year_reward: 1,
            credits_reward: 1,
            catch_up_gap: 2,
            min_players: 2,
            refund_voided_guesses: true,
        }
    }
}

/// Reconnect bounds handed to event-stream clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First reconnect delay, in milliseconds.
    pub min_retry_ms: u64,
    /// Upper bound of the reconnect delay, in milliseconds.
    pub max_retry_ms: u64,
}

impl SyncConfig {
    /// First reconnect delay.
    pub fn min_retry(&self) -> Duration {
        Duration::from_millis(self.min_retry_ms)
    }

    /// Largest reconnect delay, never below [`Self::min_retry`].
    pub fn max_retry(&self) -> Duration {
        Duration::from_millis(self.max_retry_ms.max(self.min_retry_ms))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_retry_ms: 1_000,
            max_retry_ms: 10_000,
        }
    }
}

/// A playlist served by the built-in catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistConfig {
    /// Identifier games refer to in `playlist_ids`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Tracks drawn from by games using this playlist.
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Token prices and game-wide constants.
    pub rules: RuleConstants,
    /// Settings of a game created without overrides.
    pub defaults: GameSettings,
    /// Playlists served by the built-in catalog.
    pub catalog: Vec<PlaylistConfig>,
    /// Reconnect bounds for event-stream clients.
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        playlists = app_config.catalog.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    rules: RuleConstants,
    defaults: RawGameDefaults,
    catalog: Option<Vec<PlaylistConfig>>,
    sync: SyncConfig,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let catalog = value.catalog.unwrap_or_else(default_catalog);
        let mut defaults: GameSettings = value.defaults.into();
        if defaults.playlist_ids.is_empty() {
            defaults.playlist_ids = catalog.iter().map(|playlist| playlist.id.clone()).collect();
        }

        Self {
            rules: value.rules,
            defaults,
            catalog,
            sync: value.sync,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the default settings applied to new games.
struct RawGameDefaults {
    playlist_ids: Vec<String>,
    initial_tokens: u32,
    max_tokens: u32,
    timeline_length: usize,
    artists_match_mode: ArtistsMatchMode,
    title_match_mode: TitleMatchMode,
    credits_similarity_threshold: f64,
    remove_stop_words: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    guess_timeout: Duration,
    enable_catch_up: bool,
}

impl Default for RawGameDefaults {
    fn default() -> Self {
        Self {
            playlist_ids: Vec::new(),
            initial_tokens: 2,
            max_tokens: 10,
            timeline_length: 10,
            artists_match_mode: ArtistsMatchMode::One,
            title_match_mode: TitleMatchMode::Main,
            credits_similarity_threshold: 0.8,
            remove_stop_words: true,
            guess_timeout: Duration::from_secs(30),
            enable_catch_up: true,
        }
    }
}

impl From<RawGameDefaults> for GameSettings {
    fn from(value: RawGameDefaults) -> Self {
        Self {
            playlist_ids: value.playlist_ids,
            initial_tokens: value.initial_tokens,
            max_tokens: value.max_tokens,
            timeline_length: value.timeline_length,
            artists_match_mode: value.artists_match_mode,
            title_match_mode: value.title_match_mode,
            credits_similarity_threshold: value.credits_similarity_threshold,
            remove_stop_words: value.remove_stop_words,
            guess_timeout: value.guess_timeout,
            enable_catch_up: value.enable_catch_up,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in playlist shipped with the binary so a fresh checkout can host a game.
fn default_catalog() -> Vec<PlaylistConfig> {
    let tracks = [
        ("builtin-001", "Johnny B. Goode", "Chuck Berry", 1958),
        ("builtin-002", "I Want to Hold Your Hand", "The Beatles", 1963),
        ("builtin-003", "Respect", "Aretha Franklin", 1967),
        ("builtin-004", "Bohemian Rhapsody", "Queen", 1975),
        ("builtin-005", "Le Freak", "Chic", 1978),
        ("builtin-006", "Billie Jean", "Michael Jackson", 1982),
        ("builtin-007", "Take On Me", "a-ha", 1985),
        ("builtin-008", "Smells Like Teen Spirit", "Nirvana", 1991),
        ("builtin-009", "Wannabe", "Spice Girls", 1996),
        ("builtin-010", "Hey Ya!", "OutKast", 2003),
        ("builtin-011", "Crazy in Love", "Beyoncé", 2003),
        ("builtin-012", "Rolling in the Deep", "Adele", 2010),
        ("builtin-013", "Get Lucky", "Daft Punk", 2013),
        ("builtin-014", "Blinding Lights", "The Weeknd", 2019),
    ]
    .into_iter()
    .map(|(id, title, artist, release_year)| Track {
        id: id.into(),
        title: title.into(),
        artists: vec![artist.into()],
        release_year,
        artwork_url: None,
    })
    .collect();

    vec![PlaylistConfig {
        id: "builtin".into(),
        name: "Built-in classics".into(),
        tracks,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_builtin_catalog() {
        let config = AppConfig::default();
        assert_eq!(config.defaults.playlist_ids, vec!["builtin".to_string()]);
        assert!(config.catalog[0].tracks.len() > config.defaults.timeline_length);
        assert_eq!(config.rules, RuleConstants::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "rules": { "position_reward": 2 },
                "defaults": { "guess_timeout": 45, "max_tokens": 5 },
                "sync": { "min_retry_ms": 250 }
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.rules.position_reward, 2);
        assert_eq!(config.rules.timeline_purchase_cost, 3);
        assert_eq!(config.defaults.guess_timeout, Duration::from_secs(45));
        assert_eq!(config.defaults.max_tokens, 5);
        assert_eq!(config.sync.min_retry(), Duration::from_millis(250));
        assert_eq!(config.sync.max_retry(), Duration::from_millis(10_000));
    }
}

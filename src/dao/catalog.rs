use std::{collections::HashSet, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use rand::seq::IndexedRandom;
use thiserror::Error;

use crate::{config::PlaylistConfig, state::game::Track};

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error raised by track catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No playlist carries this id.
    #[error("unknown playlist `{0}`")]
    UnknownPlaylist(String),
    /// Every track of the requested playlists was already drawn.
    #[error("no unused track left in playlists {0:?}")]
    Exhausted(Vec<String>),
    /// The catalog backend could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Unavailable(_))
    }
}

/// Metadata of a playlist known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    /// Playlist identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Number of tracks the playlist holds.
    pub track_count: usize,
}

/// Source of tracks for new turns and initial timelines.
pub trait TrackCatalog: Send + Sync {
    /// Draw a track from one of `playlist_ids` whose id is not in `exclude`.
    fn fetch_track(
        &self,
        playlist_ids: &[String],
        exclude: &HashSet<String>,
    ) -> BoxFuture<'static, CatalogResult<Track>>;

    /// Metadata of the playlist, `None` when it does not exist.
    fn find_playlist(&self, id: &str) -> BoxFuture<'static, CatalogResult<Option<PlaylistInfo>>>;
}

/// Catalog serving the playlists listed in the configuration.
#[derive(Clone)]
pub struct StaticCatalog {
    playlists: Arc<Vec<PlaylistConfig>>,
}

impl StaticCatalog {
    /// Serve the given playlists.
    pub fn new(playlists: Vec<PlaylistConfig>) -> Self {
        Self {
            playlists: Arc::new(playlists),
        }
    }

    fn draw(&self, playlist_ids: &[String], exclude: &HashSet<String>) -> CatalogResult<Track> {
        let mut candidates: Vec<&Track> = Vec::new();
        for id in playlist_ids {
            let playlist = self
                .playlists
                .iter()
                .find(|playlist| &playlist.id == id)
                .ok_or_else(|| CatalogError::UnknownPlaylist(id.clone()))?;
            candidates.extend(
                playlist
                    .tracks
                    .iter()
                    .filter(|track| !exclude.contains(&track.id)),
            );
        }

        candidates
            .choose(&mut rand::rng())
            .map(|track| (*track).clone())
            .ok_or_else(|| CatalogError::Exhausted(playlist_ids.to_vec()))
    }
}

impl TrackCatalog for StaticCatalog {
    fn fetch_track(
        &self,
        playlist_ids: &[String],
        exclude: &HashSet<String>,
    ) -> BoxFuture<'static, CatalogResult<Track>> {
        let result = self.draw(playlist_ids, exclude);
        async move { result }.boxed()
    }

    fn find_playlist(&self, id: &str) -> BoxFuture<'static, CatalogResult<Option<PlaylistInfo>>> {
        let info = self
            .playlists
            .iter()
            .find(|playlist| playlist.id == id)
            .map(|playlist| PlaylistInfo {
                id: playlist.id.clone(),
                name: playlist.name.clone(),
                track_count: playlist.tracks.len(),
            });
        async move { Ok(info) }.boxed()
    }
}

//! Media library queries
//!
//! Album, artist, playlist and random sources are answered by a
//! [`MediaLibrary`]. On the desktop the library is a music directory laid
//! out as `<root>/<artist>/<album>/<track>` with playlists kept in
//! `<root>/Playlists/<name>.m3u`.

use std::path::{Component, Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::debug;

use super::discovery::collect_audio_files;
use super::playlist;
use crate::error::{ResolveError, ResolveResult};

/// A track as reported by the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    /// Playable URI
    pub uri: String,
    /// Track title used for sorting and display
    pub title: String,
}

/// Provider queries used by the resolver.
///
/// Queries are blocking; the resolver only calls them off the controlling
/// task.
pub trait MediaLibrary: Send + Sync {
    /// Up to `limit` music tracks in random order
    fn random_tracks(&self, limit: usize) -> ResolveResult<Vec<LibraryItem>>;

    /// Tracks of an album
    fn album_tracks(&self, album_id: &str) -> ResolveResult<Vec<LibraryItem>>;

    /// Tracks of an artist
    fn artist_tracks(&self, artist_id: &str) -> ResolveResult<Vec<LibraryItem>>;

    /// Tracks of a playlist
    fn playlist_tracks(&self, playlist_id: &str) -> ResolveResult<Vec<LibraryItem>>;
}

/// Library backed by a music directory
pub struct MusicDirLibrary {
    root: Option<PathBuf>,
}

impl MusicDirLibrary {
    /// Library rooted at `root`; `None` reports every query as unavailable
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn root(&self) -> ResolveResult<&Path> {
        self.root
            .as_deref()
            .ok_or_else(|| ResolveError::LibraryUnavailable("no music directory configured".to_string()))
    }

    fn subdir(&self, id: &str) -> ResolveResult<PathBuf> {
        let relative = Path::new(id);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(ResolveError::Query(format!("invalid library id: {id}")));
        }
        Ok(self.root()?.join(relative))
    }

    fn scan(&self, dir: &Path) -> ResolveResult<Vec<LibraryItem>> {
        let files = collect_audio_files(dir)?;
        debug!(dir = %dir.display(), count = files.len(), "Scanned library directory");
        Ok(files.iter().map(|path| item_for(path)).collect())
    }
}

impl MediaLibrary for MusicDirLibrary {
    fn random_tracks(&self, limit: usize) -> ResolveResult<Vec<LibraryItem>> {
        let all = self.scan(self.root()?)?;
        let mut rng = rand::thread_rng();
        Ok(all.choose_multiple(&mut rng, limit).cloned().collect())
    }

    fn album_tracks(&self, album_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        self.scan(&self.subdir(album_id)?)
    }

    fn artist_tracks(&self, artist_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        self.scan(&self.subdir(artist_id)?)
    }

    fn playlist_tracks(&self, playlist_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        let path = self.subdir(&format!("Playlists/{playlist_id}.m3u"))?;
        let parsed = playlist::load(&path)?;
        Ok(parsed
            .entries
            .into_iter()
            .map(|entry| {
                let title = entry
                    .title
                    .unwrap_or_else(|| title_from_path(Path::new(&entry.uri)));
                LibraryItem { uri: entry.uri, title }
            })
            .collect())
    }
}

fn item_for(path: &Path) -> LibraryItem {
    LibraryItem {
        uri: path.to_string_lossy().into_owned(),
        title: title_from_path(path),
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

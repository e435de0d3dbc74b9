//! Turns classified references into ordered track lists

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::discovery::collect_audio_files;
use super::library::{LibraryItem, MediaLibrary};
use super::playlist;
use super::{SourceKind, SourceReference, Track};
use crate::error::{ResolveError, ResolveResult};
use crate::platform::Shuffler;

/// Default number of tracks sampled for random playback
pub const DEFAULT_RANDOM_SAMPLE_SIZE: usize = 50;

/// Outcome of resolving a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Effective kind; a local playlist may turn out to be a streaming one
    pub kind: SourceKind,
    /// Tracks in playback order, possibly empty
    pub tracks: Vec<Track>,
}

impl ResolvedSource {
    fn new(kind: SourceKind, tracks: Vec<Track>) -> Self {
        Self { kind, tracks }
    }
}

/// Resolves references against the filesystem and the media library.
///
/// `resolve` blocks on I/O for list-based kinds. Callers on an async
/// context run it through `spawn_blocking`.
#[derive(Clone)]
pub struct SourceResolver {
    library: Arc<dyn MediaLibrary>,
    shuffler: Arc<dyn Shuffler>,
    random_sample_size: usize,
}

impl SourceResolver {
    /// Create a resolver
    pub fn new(library: Arc<dyn MediaLibrary>, shuffler: Arc<dyn Shuffler>) -> Self {
        Self {
            library,
            shuffler,
            random_sample_size: DEFAULT_RANDOM_SAMPLE_SIZE,
        }
    }

    /// Override the random sample size
    pub fn with_random_sample_size(mut self, size: usize) -> Self {
        self.random_sample_size = size.max(1);
        self
    }

    /// Resolve `reference` into tracks.
    ///
    /// An empty list and an error mean the same thing to the caller; the
    /// error only carries a reason for logs and previews.
    pub fn resolve(
        &self,
        reference: &SourceReference,
        randomized: bool,
    ) -> ResolveResult<ResolvedSource> {
        let kind = reference.kind();
        debug!(reference = %reference, randomized, "Resolving sound source");

        let resolved = match kind {
            SourceKind::Silent => ResolvedSource::new(kind, Vec::new()),
            SourceKind::Fallback => ResolvedSource::new(kind, vec![Track::fallback()]),
            SourceKind::DirectUri if is_disguised_playlist(reference) => {
                self.playlist_source(reference, randomized)?
            }
            SourceKind::DirectUri => {
                let uri = reference
                    .path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| reference.raw().to_string());
                ResolvedSource::new(kind, vec![Track::new(uri, 0)])
            }
            SourceKind::Random => {
                let items = self.library.random_tracks(self.random_sample_size)?;
                ResolvedSource::new(kind, to_tracks(items))
            }
            SourceKind::LocalFolder => {
                let folder = reference.path().ok_or_else(|| {
                    ResolveError::Query(format!("not a folder reference: {}", reference.raw()))
                })?;
                let tracks = collect_audio_files(&folder)?
                    .iter()
                    .enumerate()
                    .map(|(position, path)| file_track(path, position))
                    .collect();
                self.ordered(kind, tracks, randomized)
            }
            SourceKind::LocalAlbum | SourceKind::LocalArtist | SourceKind::LocalPlaylist => {
                let id = reference.library_id().ok_or_else(|| {
                    ResolveError::Query(format!("missing library id: {}", reference.raw()))
                })?;
                let mut items = match kind {
                    SourceKind::LocalAlbum => self.library.album_tracks(id)?,
                    SourceKind::LocalArtist => self.library.artist_tracks(id)?,
                    _ => self.library.playlist_tracks(id)?,
                };
                items.sort_by_key(|item| item.title.to_lowercase());
                self.ordered(kind, to_tracks(items), randomized)
            }
            SourceKind::LocalM3U | SourceKind::StreamingM3U => {
                self.playlist_source(reference, randomized)?
            }
        };

        info!(
            kind = %resolved.kind,
            tracks = resolved.tracks.len(),
            "Sound source resolved"
        );
        Ok(resolved)
    }

    /// Shuffle a list in place with the configured shuffler
    pub fn shuffle(&self, tracks: &mut [Track]) {
        self.shuffler.shuffle(tracks);
    }

    fn playlist_source(
        &self,
        reference: &SourceReference,
        randomized: bool,
    ) -> ResolveResult<ResolvedSource> {
        let path = reference.path().ok_or_else(|| {
            ResolveError::Query(format!("not a playlist file: {}", reference.raw()))
        })?;
        let parsed = playlist::load(&path)?;
        let kind = if parsed.is_streaming() {
            SourceKind::StreamingM3U
        } else {
            SourceKind::LocalM3U
        };
        let tracks = parsed
            .entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                let track = Track::new(entry.uri, position);
                match entry.title {
                    Some(title) => track.with_title(title),
                    None => track,
                }
            })
            .collect();
        Ok(self.ordered(kind, tracks, randomized))
    }

    fn ordered(&self, kind: SourceKind, mut tracks: Vec<Track>, randomized: bool) -> ResolvedSource {
        if randomized {
            self.shuffler.shuffle(&mut tracks);
        }
        ResolvedSource::new(kind, tracks)
    }
}

/// A local file whose contents say playlist, whatever its name
fn is_disguised_playlist(reference: &SourceReference) -> bool {
    reference.needs_sniffing()
        && reference
            .path()
            .is_some_and(|path| path.is_file() && playlist::looks_like_playlist(&path))
}

fn to_tracks(items: Vec<LibraryItem>) -> Vec<Track> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| Track::new(item.uri, position).with_title(item.title))
        .collect()
}

fn file_track(path: &Path, position: usize) -> Track {
    let track = Track::new(path.to_string_lossy().into_owned(), position);
    match path.file_stem() {
        Some(stem) => track.with_title(stem.to_string_lossy().into_owned()),
        None => track,
    }
}

//! Sound references and their classification
//!
//! An alarm stores its sound as an opaque string. Before anything can be
//! played the string is tagged with a [`SourceKind`]; classification is
//! pure and never touches the filesystem; anything that needs file contents
//! is deferred to the [`resolver`].

pub mod discovery;
pub mod library;
pub mod playlist;
pub mod resolver;
mod track;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use library::{LibraryItem, MediaLibrary, MusicDirLibrary};
pub use resolver::{ResolvedSource, SourceResolver};
pub use track::{Track, FALLBACK_URI, IN_CALL_URI};

/// Marker stored for alarms that should not make a sound
pub const SILENT_MARKER: &str = "silent";

/// Marker stored for alarms that pick random music
pub const RANDOM_MARKER: &str = "random";

/// Authority prefix of media library references
pub const MEDIA_PROVIDER_PREFIX: &str = "content://media/audio/";

/// Scheme of references handled by an external player plugin
pub const PLUGIN_SCHEME: &str = "plugin://";

const FILE_SCHEME: &str = "file://";

/// What kind of sound a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// No sound at all
    Silent,
    /// A single ringtone, file, library track or plugin track
    DirectUri,
    /// A random sample of the music library
    Random,
    /// Every audio file below a directory
    LocalFolder,
    /// Tracks of a library album
    LocalAlbum,
    /// Tracks of a library artist
    LocalArtist,
    /// Tracks of a library playlist
    LocalPlaylist,
    /// An M3U file whose entries are local
    LocalM3U,
    /// An M3U file with remote entries or the streaming-wrapper tag
    StreamingM3U,
    /// The bundled tone
    Fallback,
}

impl SourceKind {
    /// Whether the source resolves to a list that advances on completion.
    ///
    /// Single-track kinds loop their one track instead.
    pub fn is_list_based(&self) -> bool {
        matches!(
            self,
            SourceKind::Random
                | SourceKind::LocalFolder
                | SourceKind::LocalAlbum
                | SourceKind::LocalArtist
                | SourceKind::LocalPlaylist
                | SourceKind::LocalM3U
                | SourceKind::StreamingM3U
        )
    }

    /// Whether resolution needs I/O (file scans, provider queries, parsing)
    pub fn requires_io(&self) -> bool {
        self.is_list_based()
    }

    /// Whether the session depends on network connectivity
    pub fn is_streaming(&self) -> bool {
        matches!(self, SourceKind::StreamingM3U)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Silent => "silent",
            SourceKind::DirectUri => "direct",
            SourceKind::Random => "random",
            SourceKind::LocalFolder => "folder",
            SourceKind::LocalAlbum => "album",
            SourceKind::LocalArtist => "artist",
            SourceKind::LocalPlaylist => "playlist",
            SourceKind::LocalM3U => "m3u",
            SourceKind::StreamingM3U => "streaming-m3u",
            SourceKind::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// An opaque sound reference plus its classified kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    raw: String,
    kind: SourceKind,
    delegated: bool,
    needs_sniffing: bool,
}

impl SourceReference {
    /// Classify a stored sound reference
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let kind = classify_kind(trimmed);
        // Any local file may be a playlist or a stream wrapper whatever its name
        let needs_sniffing = match kind {
            SourceKind::LocalM3U => true,
            SourceKind::DirectUri => file_path(trimmed).is_some(),
            _ => false,
        };
        Self {
            raw: trimmed.to_string(),
            kind,
            delegated: trimmed.starts_with(PLUGIN_SCHEME),
            needs_sniffing,
        }
    }

    /// Reference to the bundled tone
    pub fn fallback() -> Self {
        Self {
            raw: FALLBACK_URI.to_string(),
            kind: SourceKind::Fallback,
            delegated: false,
            needs_sniffing: false,
        }
    }

    /// The reference as stored
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Classified kind
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Whether an external player plugin owns playback of this reference
    pub fn is_delegated(&self) -> bool {
        self.delegated
    }

    /// Whether the file must be opened to tell a playlist or streaming
    /// wrapper from a plain audio file
    pub fn needs_sniffing(&self) -> bool {
        self.needs_sniffing
    }

    /// Whether resolving this reference touches the filesystem or the
    /// media library
    pub fn requires_io(&self) -> bool {
        self.kind.requires_io() || self.needs_sniffing
    }

    /// Filesystem path for file references
    pub fn path(&self) -> Option<PathBuf> {
        file_path(&self.raw)
    }

    /// Library identifier for album, artist and playlist references
    pub fn library_id(&self) -> Option<&str> {
        let rest = self.raw.strip_prefix(MEDIA_PROVIDER_PREFIX)?;
        let (_, id) = rest.split_once('/')?;
        let id = id.trim_end_matches('/');
        (!id.is_empty()).then_some(id)
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.raw, self.kind)
    }
}

/// Classify a stored sound reference (see [`SourceReference::classify`])
pub fn classify(raw: &str) -> SourceReference {
    SourceReference::classify(raw)
}

fn classify_kind(reference: &str) -> SourceKind {
    if reference.is_empty() {
        return SourceKind::Fallback;
    }
    if reference.eq_ignore_ascii_case(SILENT_MARKER) {
        return SourceKind::Silent;
    }
    if reference.eq_ignore_ascii_case(RANDOM_MARKER) {
        return SourceKind::Random;
    }
    if reference == FALLBACK_URI {
        return SourceKind::Fallback;
    }

    if let Some(rest) = reference.strip_prefix(MEDIA_PROVIDER_PREFIX) {
        let (collection, id) = rest.split_once('/').unwrap_or((rest, ""));
        if id.trim_end_matches('/').is_empty() {
            return SourceKind::Fallback;
        }
        return match collection {
            "albums" => SourceKind::LocalAlbum,
            "artists" => SourceKind::LocalArtist,
            "playlists" => SourceKind::LocalPlaylist,
            _ => SourceKind::DirectUri,
        };
    }

    if let Some(path) = file_path(reference) {
        if reference.ends_with('/') {
            return SourceKind::LocalFolder;
        }
        if playlist::has_playlist_extension(&path) {
            return SourceKind::LocalM3U;
        }
        return SourceKind::DirectUri;
    }

    SourceKind::DirectUri
}

fn file_path(reference: &str) -> Option<PathBuf> {
    if let Some(path) = reference.strip_prefix(FILE_SCHEME) {
        return (!path.is_empty()).then(|| PathBuf::from(path));
    }
    let path = PathBuf::from(reference);
    path.is_absolute().then_some(path)
}

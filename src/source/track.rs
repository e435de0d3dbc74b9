//! Playable items and the bundled sounds
//!
//! Builtin sounds use the `builtin:` scheme and are synthesized by the
//! player rather than read from disk.

use std::fmt;

/// URI of the bundled fallback tone
pub const FALLBACK_URI: &str = "builtin:fallback";

/// URI of the quiet clip played while a call is active
pub const IN_CALL_URI: &str = "builtin:in-call";

const BUILTIN_SCHEME: &str = "builtin:";

/// One playable item of a resolved source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    /// Path, URL or builtin name handed to the player
    pub uri: String,
    /// Display title (library title or `#EXTINF` title)
    pub title: Option<String>,
    /// Position in the list as it was resolved
    pub position: usize,
}

impl Track {
    /// Create a track without a title
    pub fn new(uri: impl Into<String>, position: usize) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            position,
        }
    }

    /// Attach a display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    /// The bundled fallback tone
    pub fn fallback() -> Self {
        Self::new(FALLBACK_URI, 0).with_title("Fallback alarm tone")
    }

    /// The quiet in-call clip
    pub fn in_call() -> Self {
        Self::new(IN_CALL_URI, 0).with_title("In-call alarm")
    }

    /// Whether this is the fallback tone
    pub fn is_fallback(&self) -> bool {
        self.uri == FALLBACK_URI
    }

    /// Name of a synthesized builtin sound, if this is one
    pub fn builtin_name(&self) -> Option<&str> {
        self.uri.strip_prefix(BUILTIN_SCHEME)
    }

    /// Whether playback needs the network
    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }

    /// Title if known, otherwise the URI
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.uri)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

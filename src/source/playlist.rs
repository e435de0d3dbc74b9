//! M3U playlist parsing
//!
//! Two shapes are accepted: the extended form (`#EXTM3U` header with an
//! `#EXTINF:` line before each URI) and a bare list of URIs. A third,
//! app-specific convention puts [`STREAM_SENTINEL`] in an `#EXTINF` title
//! to mark a file that only wraps a named internet stream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{ResolveError, ResolveResult};

/// Tag that marks a playlist as a streaming wrapper
pub const STREAM_SENTINEL: &str = "[alarm-stream]";

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";

/// Bytes read from the start of a file when checking for playlist content
const SNIFF_LEN: u64 = 4096;

/// Which of the accepted shapes a playlist used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    /// `#EXTM3U` header with `#EXTINF` metadata
    Extended,
    /// One URI per line
    Bare,
}

/// A single playlist line resolved to a playable URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Absolute path or remote URL
    pub uri: String,
    /// Title from the preceding `#EXTINF` line
    pub title: Option<String>,
}

impl PlaylistEntry {
    /// Whether the entry is fetched over the network
    pub fn is_remote(&self) -> bool {
        is_remote_uri(&self.uri)
    }
}

/// Parsed playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    /// Entries in file order
    pub entries: Vec<PlaylistEntry>,
    /// Shape of the file
    pub format: PlaylistFormat,
    /// Whether the file carried the streaming-wrapper tag
    pub streaming_wrapper: bool,
}

impl Playlist {
    /// Whether playing this playlist depends on connectivity
    pub fn is_streaming(&self) -> bool {
        self.streaming_wrapper || self.entries.iter().any(PlaylistEntry::is_remote)
    }
}

/// Whether the path has a playlist extension
pub fn has_playlist_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("m3u") || ext.eq_ignore_ascii_case("m3u8"))
        .unwrap_or(false)
}

/// Whether the start of a file looks like a playlist: an `#EXTM3U` header,
/// an `#EXTINF` line or the streaming tag. Unreadable files count as audio
/// and are left for the player to report.
pub fn looks_like_playlist(path: &Path) -> bool {
    let mut head = Vec::new();
    let read = File::open(path).and_then(|file| file.take(SNIFF_LEN).read_to_end(&mut head));
    if let Err(e) = read {
        debug!(path = %path.display(), error = %e, "Cannot inspect file, treating it as audio");
        return false;
    }
    is_playlist_text(&String::from_utf8_lossy(&head))
}

fn is_playlist_text(head: &str) -> bool {
    let head = head.strip_prefix('\u{feff}').unwrap_or(head);
    head.trim_start().starts_with(HEADER)
        || head.contains(STREAM_SENTINEL)
        || head.lines().any(|line| line.trim_start().starts_with(EXTINF))
}

/// Read and parse a playlist file; relative entries resolve against its
/// parent directory
pub fn load(path: &Path) -> ResolveResult<Playlist> {
    let bytes = std::fs::read(path).map_err(|e| ResolveError::from_io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| ResolveError::Playlist {
        path: path.to_path_buf(),
        reason: "not valid UTF-8 text".to_string(),
    })?;
    Ok(parse(&text, path.parent()))
}

/// Parse playlist text
pub fn parse(text: &str, base_dir: Option<&Path>) -> Playlist {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut format = PlaylistFormat::Bare;
    let mut streaming_wrapper = false;
    let mut pending_title: Option<String> = None;
    let mut entries = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line_no == 0 && line.starts_with(HEADER) {
            format = PlaylistFormat::Extended;
            continue;
        }

        if let Some(info) = line.strip_prefix(EXTINF) {
            format = PlaylistFormat::Extended;
            let title = info.split_once(',').map(|(_, title)| title.trim()).unwrap_or("");
            if title.contains(STREAM_SENTINEL) {
                streaming_wrapper = true;
            }
            let title = title.replace(STREAM_SENTINEL, "");
            let title = title.trim();
            pending_title = (!title.is_empty()).then(|| title.to_string());
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        entries.push(PlaylistEntry {
            uri: resolve_entry(line, base_dir),
            title: pending_title.take(),
        });
    }

    Playlist {
        entries,
        format,
        streaming_wrapper,
    }
}

fn resolve_entry(line: &str, base_dir: Option<&Path>) -> String {
    if let Some(path) = line.strip_prefix("file://") {
        return path.to_string();
    }
    if line.contains("://") {
        return line.to_string();
    }

    let path = Path::new(line);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path).to_string_lossy().into_owned(),
        _ => line.to_string(),
    }
}

fn is_remote_uri(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_format() {
        let text = "#EXTM3U\n#EXTINF:123,Artist - Morning\nmorning.mp3\n#EXTINF:-1,Evening\n/abs/evening.ogg\n";
        let playlist = parse(text, Some(Path::new("/music/lists")));

        assert_eq!(playlist.format, PlaylistFormat::Extended);
        assert!(!playlist.is_streaming());
        assert_eq!(
            playlist.entries,
            vec![
                PlaylistEntry {
                    uri: "/music/lists/morning.mp3".to_string(),
                    title: Some("Artist - Morning".to_string()),
                },
                PlaylistEntry {
                    uri: "/abs/evening.ogg".to_string(),
                    title: Some("Evening".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_bare_format_with_crlf_and_comments() {
        let text = "\u{feff}a.mp3\r\n# a comment\r\n\r\nfile:///x/b.mp3\r\n";
        let playlist = parse(text, Some(Path::new("/base")));

        assert_eq!(playlist.format, PlaylistFormat::Bare);
        let uris: Vec<_> = playlist.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["/base/a.mp3", "/x/b.mp3"]);
        assert!(playlist.entries.iter().all(|e| e.title.is_none()));
    }

    #[test]
    fn test_streaming_wrapper_sentinel() {
        let text = "#EXTM3U\n#EXTINF:-1,[alarm-stream] Jazz Radio\nhttp://radio.example/jazz\n";
        let playlist = parse(text, None);

        assert!(playlist.streaming_wrapper);
        assert!(playlist.is_streaming());
        assert_eq!(playlist.entries[0].title.as_deref(), Some("Jazz Radio"));
        assert_eq!(playlist.entries[0].uri, "http://radio.example/jazz");
    }

    #[test]
    fn test_remote_entries_are_streaming() {
        let playlist = parse("https://cdn.example/a.mp3\n", None);
        assert!(!playlist.streaming_wrapper);
        assert!(playlist.is_streaming());
    }

    #[test]
    fn test_load_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.m3u");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(matches!(load(&path), Err(ResolveError::Playlist { .. })));
    }

    #[test]
    fn test_sniffing_file_contents() {
        let dir = tempfile::tempdir().unwrap();

        let wrapper = dir.path().join("jazz_station");
        std::fs::write(&wrapper, "#EXTM3U\n#EXTINF:-1,[alarm-stream] Jazz\nhttp://radio.example/jazz\n").unwrap();
        assert!(looks_like_playlist(&wrapper));

        let bare_info = dir.path().join("list.txt");
        std::fs::write(&bare_info, "\u{feff}#EXTINF:10,One\none.mp3\n").unwrap();
        assert!(looks_like_playlist(&bare_info));

        let audio = dir.path().join("bell.ogg");
        std::fs::write(&audio, [0x4f, 0x67, 0x67, 0x53, 0x00, 0x02, 0xff]).unwrap();
        assert!(!looks_like_playlist(&audio));

        assert!(!looks_like_playlist(&dir.path().join("missing.mp3")));
    }

    #[test]
    fn test_playlist_extension() {
        assert!(has_playlist_extension(Path::new("x.M3U")));
        assert!(has_playlist_extension(Path::new("x.m3u8")));
        assert!(!has_playlist_extension(Path::new("x.mp3")));
    }
}

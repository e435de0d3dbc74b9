//! Folder scanning for audio files

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ResolveError, ResolveResult};

/// Extension to MIME type table used for the audio-type test
const MIME_TYPES: [(&str, &str); 14] = [
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/opus"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("aac", "audio/aac"),
    ("m4a", "audio/mp4"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("wma", "audio/x-ms-wma"),
    ("m3u", "audio/x-mpegurl"),
    ("m3u8", "application/vnd.apple.mpegurl"),
    ("mp4", "video/mp4"),
];

/// MIME type guessed from the file extension
pub fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    MIME_TYPES
        .iter()
        .find(|(known, _)| ext.eq_ignore_ascii_case(known))
        .map(|(_, mime)| *mime)
}

/// Whether a file is playable audio.
///
/// Playlists carry an `audio/` MIME type too but are not tracks themselves.
pub fn is_audio_file(path: &Path) -> bool {
    match mime_type(path) {
        Some(mime) => mime.starts_with("audio/") && !mime.ends_with("mpegurl"),
        None => false,
    }
}

/// Recursively collect audio files below `folder`, sorted by path.
///
/// Unreadable subdirectories are skipped; only failing to read `folder`
/// itself is an error.
pub fn collect_audio_files(folder: &Path) -> ResolveResult<Vec<PathBuf>> {
    std::fs::read_dir(folder).map_err(|e| ResolveError::from_io(folder, e))?;

    let mut pending_directories = vec![folder.to_path_buf()];
    let mut tracks = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %directory.display(), error = %err, "Skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                debug!(path = %path.display(), "Failed to inspect entry");
                continue;
            };

            if file_type.is_dir() {
                pending_directories.push(path);
            } else if file_type.is_file() && is_audio_file(&path) {
                tracks.push(path);
            }
        }
    }

    tracks.sort_unstable();
    Ok(tracks)
}

// Error types for the alarm audio engine
//
// This module defines error types using thiserror for better error handling
// and debugging throughout the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Conditions that end a session.
///
/// Mirrors the recovery taxonomy: resolution coming back empty, a playback
/// failure and losing the network. Only the last two are ever fatal in
/// practice; an empty resolution is answered with the fallback tone.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No playable tracks: {0}")]
    ResolutionEmpty(String),

    #[error("Fallback tone failed to play: {0}")]
    FallbackFailed(#[source] PlayerError),

    #[error("Network connection lost while streaming")]
    NetworkLost,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Errors produced while turning a sound reference into tracks.
///
/// Every variant folds into the "resolution empty" recovery path; the
/// distinction only matters for logging and preview diagnostics.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid playlist {path}: {reason}")]
    Playlist { path: PathBuf, reason: String },

    #[error("Media library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("Media library query failed: {0}")]
    Query(String),
}

impl ResolveError {
    /// Map an I/O failure on `path` to the most specific variant
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => ResolveError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => ResolveError::PermissionDenied(path),
            _ => ResolveError::Io { path, source },
        }
    }
}

/// Errors reported by a media backend for a single track
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Failed to open media: {0}")]
    Open(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Audio output unavailable: {0}")]
    Output(String),
}

// Convenience type aliases for common Result types
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
pub type PlayerResult<T> = std::result::Result<T, PlayerError>;

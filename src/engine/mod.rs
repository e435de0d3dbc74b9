//! Playback sessions and the two front-ends that start them
//!
//! A session turns one [`SessionRequest`] into sound: classify the
//! reference, resolve it, drive a single player through the track list,
//! ramp the volume, watch the network for streaming sources and recover
//! from failures. [`live::LiveEngine`] fires real alarms (one session at a
//! time); [`preview::PreviewEngine`] plays sounds for a settings screen.

pub mod controller;
pub mod live;
pub mod preview;
pub mod recovery;
mod session;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::MediaBackend;
use crate::config::Config;
use crate::error::{EngineError, PlayerError};
use crate::network::ConnectivityMonitor;
use crate::platform::{AudioFocus, CallStateProvider, Shuffler, Vibrator};
use crate::source::{MediaLibrary, SourceKind, Track};
use crate::volume::{AudioStream, VolumeControl, VOLUME_FROM_SYSTEM};

pub use controller::SessionHandle;
pub use live::{LiveEngine, LiveEvent, Notification};
pub use preview::{PreviewEngine, PreviewListener};
pub use recovery::RecoveryAction;

/// Everything a session needs from its host
#[derive(Clone)]
pub struct EngineServices {
    /// Creates the session's player
    pub backend: Arc<dyn MediaBackend>,
    /// Device stream volume
    pub volume: Arc<dyn VolumeControl>,
    /// Audio focus arbiter
    pub focus: Arc<dyn AudioFocus>,
    /// Connectivity signals for streaming sessions
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    /// Telephony state
    pub telephony: Arc<dyn CallStateProvider>,
    /// Vibration motor
    pub vibrator: Arc<dyn Vibrator>,
    /// Album, artist, playlist and random queries
    pub library: Arc<dyn MediaLibrary>,
    /// Ordering for random playback
    pub shuffler: Arc<dyn Shuffler>,
}

/// Settings that apply to every session an engine starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Stream sessions play on
    pub stream: AudioStream,
    /// Delay between ramp steps
    pub ramp_step_interval: Duration,
    /// Global vibrate toggle
    pub vibrate: bool,
    /// Tracks sampled for random playback
    pub random_sample_size: usize,
    /// Alarm-scale volume of the in-call clip
    pub in_call_volume: u32,
}

impl EngineSettings {
    /// Settings taken from the configuration file
    pub fn from_config(config: &Config) -> Self {
        Self {
            stream: config.audio_stream,
            ramp_step_interval: config.ramp_step_interval(),
            vibrate: config.vibrate,
            random_sample_size: config.random_sample_size,
            in_call_volume: config.in_call_volume,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What the alarm asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Stored sound reference
    pub sound_reference: String,
    /// Alarm-scale volume, or [`VOLUME_FROM_SYSTEM`]
    pub volume: i32,
    /// Vibrate while ringing
    pub vibrate: bool,
    /// Ramp the volume up from the lowest step
    pub increasing_volume: bool,
    /// Shuffle list sources
    pub random_playback: bool,
    /// Quiet reminder before the real alarm
    pub is_pre_alarm: bool,
}

impl SessionRequest {
    /// Request for `reference` with default options
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            sound_reference: reference.into(),
            volume: VOLUME_FROM_SYSTEM,
            vibrate: true,
            increasing_volume: false,
            random_playback: false,
            is_pre_alarm: false,
        }
    }

    /// Which kind of alarm this is
    pub fn mode(&self) -> PlaybackMode {
        if self.is_pre_alarm {
            PlaybackMode::PreAlarm
        } else {
            PlaybackMode::Alarm
        }
    }
}

/// Alarm or pre-alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackMode {
    /// The main alarm
    Alarm,
    /// A reminder ahead of the main alarm
    PreAlarm,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMode::Alarm => f.write_str("alarm"),
            PlaybackMode::PreAlarm => f.write_str("pre-alarm"),
        }
    }
}

/// Session lifecycle.
///
/// `Idle → Resolving → Preparing → Playing → Advancing → Preparing …`;
/// `Silent` sessions are active but make no sound. `Stopped` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Created, nothing requested yet
    Idle,
    /// Waiting for the track list
    Resolving,
    /// Waiting for the player to load a track
    Preparing,
    /// A track is audible
    Playing,
    /// Moving to the next track
    Advancing,
    /// Active without sound
    Silent,
    /// Torn down
    Stopped,
}

impl PlaybackState {
    /// Whether the session still holds resources
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackState::Stopped)
    }
}

/// Point-in-time copy of a session's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Lifecycle state
    pub state: PlaybackState,
    /// Alarm or pre-alarm
    pub mode: PlaybackMode,
    /// Kind after resolution
    pub kind: SourceKind,
    /// Tracks in playback order
    pub tracks: Vec<Track>,
    /// Index of the current track
    pub current_index: usize,
    /// Whether the bundled tone replaced the resolved tracks
    pub on_fallback: bool,
    /// Level the stream is set or ramped to
    pub volume_target: u32,
}

impl SessionSnapshot {
    /// Track the player is on, if any
    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }
}

/// Callbacks from a running session.
///
/// Invoked from the session's controlling task, never while session state
/// is locked, so implementations may call back into the [`SessionHandle`].
pub trait SessionObserver: Send + Sync {
    /// Resolution started on a background thread
    fn on_resolving(&self) {}

    /// Resolution produced `tracks` tracks of `kind`
    fn on_resolved(&self, _kind: SourceKind, _tracks: usize) {}

    /// Resolution produced nothing; the fallback tone follows
    fn on_resolution_empty(&self, _reason: &str) {}

    /// The session mutes (silent or handed to an external player)
    fn on_silent(&self, _delegated: bool) {}

    /// The player moved to `track`
    fn on_track_changed(&self, _track: &Track) {}

    /// The first track actually started
    fn on_first_sound(&self) {}

    /// A track failed and the session recovered with `action`
    fn on_recovery(&self, _action: RecoveryAction, _error: &PlayerError) {}

    /// The session hit a failure it cannot recover from
    fn on_fatal(&self, _error: &EngineError) {}

    /// The session was torn down
    fn on_stopped(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

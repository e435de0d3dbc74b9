//! Alarm audio playback engine
//!
//! Turns an alarm's stored sound reference (a ringtone, a folder, an album,
//! artist or playlist, a random selection, a local or streaming M3U file, or
//! silence) into reliably starting audio, with volume ramp-up, failure
//! recovery, a fallback tone and network-loss handling for streams.
//!
//! [`LiveEngine`] fires real alarms; [`PreviewEngine`] plays sounds while an
//! alarm is being edited. Both drive the same session controller.

#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod config_watcher;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod network;
pub mod platform;
pub mod source;
pub mod volume;

// Re-export commonly used types
pub use audio::{DesktopBackend, MediaBackend, MediaPlayer, PlayerEvent, PlayerEventKind, PlayerEvents};
pub use config::{Config, ConnectivityConfig};
pub use config_watcher::{ConfigReloadEvent, ConfigWatcher};
pub use engine::{
    EngineServices, EngineSettings, LiveEngine, LiveEvent, Notification, PlaybackMode,
    PlaybackState, PreviewEngine, PreviewListener, SessionHandle, SessionObserver, SessionRequest,
    SessionSnapshot,
};
pub use error::{ConfigError, EngineError, PlayerError, ResolveError};
pub use metrics::{SessionMetrics, Timer};
pub use network::{ConnectivityMonitor, HttpProbeMonitor, ManualConnectivity, NetworkMonitorHandle};
pub use platform::{AudioFocus, CallStateProvider, FocusTracker, NoTelephony, NoVibrator, RandomShuffler, Shuffler, Vibrator};
pub use source::{classify, ResolvedSource, SourceKind, SourceReference, SourceResolver, Track};
pub use volume::{AudioStream, SoftwareMixer, VolumeControl, VolumeRamp};

//! Preview engine: plays a sound while an alarm is being edited
//!
//! Every preview is its own session, reported through a
//! [`PreviewListener`]. Unlike a live alarm, every problem is surfaced to
//! the listener straight away since the point of a preview is to find out
//! whether a sound choice works. Previews never vibrate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::controller::{self, SessionPlan};
use super::session::SessionParams;
use super::{
    EngineServices, EngineSettings, RecoveryAction, SessionHandle, SessionObserver, SessionRequest,
};
use crate::error::{EngineError, PlayerError};
use crate::source::{SourceKind, SourceReference, Track};
use crate::volume::target_volume;

/// Callbacks for a sound-picker UI
pub trait PreviewListener: Send + Sync {
    /// Something went wrong; the message is meant for the user
    fn on_error(&self, message: &str);

    /// Informational status for the user
    fn on_info(&self, message: &str);

    /// Playback moved to `track`
    fn on_track_changed(&self, track: &Track);

    /// A slow operation (folder scan, library query) started
    fn start_progress(&self);

    /// The slow operation finished
    fn stop_progress(&self);
}

/// Starts preview sessions
pub struct PreviewEngine {
    services: EngineServices,
    settings: EngineSettings,
}

impl PreviewEngine {
    /// Engine starting previews with `services` and `settings`
    pub fn new(services: EngineServices, settings: EngineSettings) -> Self {
        Self { services, settings }
    }

    /// Play `request` until the returned handle is stopped or dropped.
    ///
    /// Must be called from within a tokio runtime. The device volume is put
    /// back when the preview ends, however far the ramp got.
    pub fn start(&self, request: &SessionRequest, listener: Arc<dyn PreviewListener>) -> SessionHandle {
        let reference = SourceReference::classify(&request.sound_reference);
        debug!(reference = %reference, "Starting preview");

        let params = SessionParams {
            mode: request.mode(),
            stream: self.settings.stream,
            randomized: request.random_playback,
            volume_target: target_volume(
                request.volume,
                self.settings.stream,
                self.services.volume.as_ref(),
            ),
            ramp_enabled: request.increasing_volume,
            ramp_step: self.settings.ramp_step_interval,
            vibrate: false,
        };
        let observer = Arc::new(PreviewObserver {
            listener,
            in_progress: AtomicBool::new(false),
        });

        controller::start(
            &self.services,
            params,
            SessionPlan::Resolve(reference),
            self.settings.random_sample_size,
            observer,
        )
    }
}

struct PreviewObserver {
    listener: Arc<dyn PreviewListener>,
    in_progress: AtomicBool,
}

impl PreviewObserver {
    fn finish_progress(&self) {
        if self.in_progress.swap(false, Ordering::SeqCst) {
            self.listener.stop_progress();
        }
    }
}

impl SessionObserver for PreviewObserver {
    fn on_resolving(&self) {
        self.in_progress.store(true, Ordering::SeqCst);
        self.listener.start_progress();
    }

    fn on_resolved(&self, kind: SourceKind, tracks: usize) {
        self.finish_progress();
        if kind.is_list_based() {
            self.listener.on_info(&format!("Found {tracks} tracks"));
        }
    }

    fn on_resolution_empty(&self, reason: &str) {
        self.finish_progress();
        self.listener.on_error(&format!(
            "No playable tracks ({reason}); playing the fallback tone"
        ));
    }

    fn on_silent(&self, delegated: bool) {
        if delegated {
            self.listener.on_info("This sound is played by an external player");
        } else {
            self.listener.on_info("This alarm is silent");
        }
    }

    fn on_track_changed(&self, track: &Track) {
        self.listener.on_track_changed(track);
    }

    fn on_recovery(&self, action: RecoveryAction, error: &PlayerError) {
        let message = match action {
            RecoveryAction::SkipTrack => format!("{error}; skipping to the next track"),
            RecoveryAction::SubstituteFallback => format!("{error}; playing the fallback tone"),
            _ => error.to_string(),
        };
        self.listener.on_error(&message);
    }

    fn on_fatal(&self, error: &EngineError) {
        self.listener.on_error(&error.to_string());
    }

    fn on_stopped(&self) {
        self.finish_progress();
    }
}

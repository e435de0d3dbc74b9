//! Live engine: fires real alarms
//!
//! One engine per process, holding at most one session. Starting an alarm
//! always tears the previous session down first. The rest of the app hears
//! about alarms through [`LiveEvent`]s; the only user-facing notification
//! is raised when a streaming alarm loses the network.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::controller::{self, SessionPlan};
use super::session::SessionParams;
use super::{
    EngineServices, EngineSettings, PlaybackMode, PlaybackState, SessionHandle, SessionObserver,
    SessionRequest, SessionSnapshot,
};
use crate::error::EngineError;
use crate::source::{SourceKind, SourceReference, Track};
use crate::volume::target_volume;

/// User-visible notice raised by the live engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// When the condition was detected
    pub timestamp: DateTime<Local>,
}

/// Signals from the live engine to the rest of the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// An alarm session started
    AlarmStarted { mode: PlaybackMode },
    /// The alarm session ended, for whatever reason
    AlarmDone { mode: PlaybackMode },
    /// Something the user must see
    Notification(Notification),
}

/// Fires alarms, one at a time
pub struct LiveEngine {
    services: EngineServices,
    settings: Mutex<EngineSettings>,
    active: Mutex<Option<SessionHandle>>,
    events: mpsc::UnboundedSender<LiveEvent>,
}

impl LiveEngine {
    /// Create the engine and the receiver for its events
    pub fn new(
        services: EngineServices,
        settings: EngineSettings,
    ) -> (Self, mpsc::UnboundedReceiver<LiveEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            services,
            settings: Mutex::new(settings),
            active: Mutex::new(None),
            events,
        };
        (engine, rx)
    }

    /// Settings for sessions started from now on
    pub fn update_settings(&self, settings: EngineSettings) {
        debug!(settings = ?settings, "Live engine settings updated");
        *lock(&self.settings) = settings;
    }

    /// Fire an alarm, stopping any alarm already ringing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: &SessionRequest) {
        let mut active = lock(&self.active);
        if let Some(previous) = active.take() {
            info!("Replacing the active alarm session");
            previous.stop();
        }

        let settings = lock(&self.settings).clone();
        let mode = request.mode();
        let observer = Arc::new(LiveObserver {
            mode,
            events: self.events.clone(),
        });

        let (plan, params) = if self.services.telephony.is_call_active() {
            info!(mode = %mode, "Call in progress, playing the in-call clip");
            let params = SessionParams {
                mode,
                stream: settings.stream,
                randomized: false,
                volume_target: target_volume(
                    // Saturates; target_volume clamps to the stream maximum
                    i32::try_from(settings.in_call_volume).unwrap_or(i32::MAX),
                    settings.stream,
                    self.services.volume.as_ref(),
                ),
                ramp_enabled: false,
                ramp_step: settings.ramp_step_interval,
                vibrate: request.vibrate && settings.vibrate,
            };
            let plan = SessionPlan::Fixed {
                kind: SourceKind::DirectUri,
                tracks: vec![Track::in_call()],
            };
            (plan, params)
        } else {
            let params = SessionParams {
                mode,
                stream: settings.stream,
                randomized: request.random_playback,
                volume_target: target_volume(
                    request.volume,
                    settings.stream,
                    self.services.volume.as_ref(),
                ),
                ramp_enabled: request.increasing_volume,
                ramp_step: settings.ramp_step_interval,
                vibrate: request.vibrate && settings.vibrate,
            };
            let plan = SessionPlan::Resolve(SourceReference::classify(&request.sound_reference));
            (plan, params)
        };

        self.send(LiveEvent::AlarmStarted { mode });
        let handle = controller::start(
            &self.services,
            params,
            plan,
            settings.random_sample_size,
            observer,
        );
        *active = Some(handle);
    }

    /// Stop the ringing alarm, if any; idempotent
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.active).as_ref() {
            handle.stop();
        }
    }

    /// State of the current session; `Idle` when none was ever started
    pub fn state(&self) -> PlaybackState {
        lock(&self.active)
            .as_ref()
            .map(SessionHandle::state)
            .unwrap_or(PlaybackState::Idle)
    }

    /// Whether an alarm is ringing
    pub fn is_active(&self) -> bool {
        lock(&self.active)
            .as_ref()
            .is_some_and(SessionHandle::is_active)
    }

    /// Snapshot of the current session
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        lock(&self.active).as_ref().map(SessionHandle::snapshot)
    }

    fn send(&self, event: LiveEvent) {
        if self.events.send(event).is_err() {
            warn!("Live event receiver dropped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Routes session callbacks into [`LiveEvent`]s.
///
/// Recoverable problems only reach the logs; an alarm keeps ringing on the
/// fallback tone rather than bothering the user.
struct LiveObserver {
    mode: PlaybackMode,
    events: mpsc::UnboundedSender<LiveEvent>,
}

impl SessionObserver for LiveObserver {
    fn on_fatal(&self, error: &EngineError) {
        if let EngineError::NetworkLost = error {
            let notification = Notification {
                title: "Alarm stopped".to_string(),
                message: "The network connection was lost while streaming the alarm sound."
                    .to_string(),
                timestamp: Local::now(),
            };
            let _ = self.events.send(LiveEvent::Notification(notification));
        }
    }

    fn on_stopped(&self) {
        let _ = self.events.send(LiveEvent::AlarmDone { mode: self.mode });
    }
}

//! Playback controller: the task that drives one session
//!
//! Resolution results, player events and connectivity loss all arrive as
//! messages on the session's controlling task, which applies them one at a
//! time under the session lock. Observer callbacks are collected while the
//! lock is held and delivered after it is released.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::recovery::{decide, KindShape, RecoveryAction, Trigger};
use super::session::{SessionCore, SessionParams};
use super::{EngineServices, PlaybackState, SessionObserver, SessionSnapshot};
use crate::audio::{PlayerEvent, PlayerEventKind};
use crate::error::{EngineError, PlayerError, ResolveResult};
use crate::source::{ResolvedSource, SourceKind, SourceReference, SourceResolver, Track};

/// What a session plays
#[derive(Debug, Clone)]
pub(crate) enum SessionPlan {
    /// Classify-and-resolve a stored reference
    Resolve(SourceReference),
    /// Play a known list without resolution
    Fixed { kind: SourceKind, tracks: Vec<Track> },
}

enum Control {
    Resolved(ResolveResult<ResolvedSource>),
    ConnectivityLost,
}

/// Observer callbacks queued while the session lock is held
enum Notice {
    Resolving,
    Resolved(SourceKind, usize),
    ResolutionEmpty(String),
    Silent { delegated: bool },
    TrackChanged(Track),
    FirstSound,
    Recovery(RecoveryAction, PlayerError),
    Fatal(EngineError),
    Stopped,
}

fn dispatch(observer: &dyn SessionObserver, notices: Vec<Notice>) {
    for notice in notices {
        match notice {
            Notice::Resolving => observer.on_resolving(),
            Notice::Resolved(kind, count) => observer.on_resolved(kind, count),
            Notice::ResolutionEmpty(reason) => observer.on_resolution_empty(&reason),
            Notice::Silent { delegated } => observer.on_silent(delegated),
            Notice::TrackChanged(track) => observer.on_track_changed(&track),
            Notice::FirstSound => observer.on_first_sound(),
            Notice::Recovery(action, error) => observer.on_recovery(action, &error),
            Notice::Fatal(error) => observer.on_fatal(&error),
            Notice::Stopped => observer.on_stopped(),
        }
    }
}

fn lock(core: &Mutex<SessionCore>) -> MutexGuard<'_, SessionCore> {
    core.lock().unwrap_or_else(|e| e.into_inner())
}

/// Control over a running session.
///
/// Dropping the handle stops the session.
pub struct SessionHandle {
    core: Arc<Mutex<SessionCore>>,
    observer: Arc<dyn SessionObserver>,
    state_rx: watch::Receiver<PlaybackState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Stop the session; idempotent.
    ///
    /// Teardown is complete when this returns: player released, ramp
    /// cancelled, volume restored, monitor detached, focus abandoned.
    pub fn stop(&self) {
        let stopped = lock(&self.core).teardown();
        self.task.abort();
        if stopped {
            info!("Session stopped");
            self.observer.on_stopped();
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlaybackState {
        lock(&self.core).state
    }

    /// Whether the session still holds resources
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Copy of the session's current state
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.core).snapshot()
    }

    /// Watch lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    /// Wait until the session stops, whatever the cause
    pub async fn stopped(&self) {
        let mut state_rx = self.state_rx.clone();
        // An error means the session is gone, which is just as final
        let _ = state_rx.wait_for(|state| !state.is_active()).await;
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start a session on the current tokio runtime
pub(crate) fn start(
    services: &EngineServices,
    params: SessionParams,
    plan: SessionPlan,
    random_sample_size: usize,
    observer: Arc<dyn SessionObserver>,
) -> SessionHandle {
    let (player_tx, player_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let initial_kind = match &plan {
        SessionPlan::Resolve(reference) => reference.kind(),
        SessionPlan::Fixed { kind, .. } => *kind,
    };
    let (core, state_rx) = SessionCore::new(services.clone(), params, initial_kind, player_tx);
    let core = Arc::new(Mutex::new(core));

    let driver = Driver {
        core: Arc::clone(&core),
        control_tx,
        resolver: SourceResolver::new(services.library.clone(), services.shuffler.clone())
            .with_random_sample_size(random_sample_size),
    };

    let notices = driver.begin(plan);
    dispatch(observer.as_ref(), notices);

    let task = tokio::spawn(driver.run(Arc::clone(&observer), player_rx, control_rx));

    SessionHandle {
        core,
        observer,
        state_rx,
        task,
    }
}

struct Driver {
    core: Arc<Mutex<SessionCore>>,
    control_tx: mpsc::UnboundedSender<Control>,
    resolver: SourceResolver,
}

impl Driver {
    async fn run(
        self,
        observer: Arc<dyn SessionObserver>,
        mut player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
    ) {
        loop {
            let notices = tokio::select! {
                Some(event) = player_rx.recv() => self.on_player_event(event),
                Some(control) = control_rx.recv() => self.on_control(control),
                else => break,
            };
            dispatch(observer.as_ref(), notices);
            if self.is_stopped() {
                break;
            }
        }
        trace!("Session task finished");
    }

    fn is_stopped(&self) -> bool {
        lock(&self.core).is_stopped()
    }

    fn begin(&self, plan: SessionPlan) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut core = lock(&self.core);
        core.start_vibration();

        match plan {
            SessionPlan::Fixed { kind, tracks } => {
                core.install(kind, tracks);
                self.prepare(&mut core, &mut notices);
            }
            SessionPlan::Resolve(reference) => {
                info!(reference = %reference, mode = %core.params.mode, "Starting session");
                if reference.is_delegated() || reference.kind() == SourceKind::Silent {
                    core.set_state(PlaybackState::Silent);
                    notices.push(Notice::Silent {
                        delegated: reference.is_delegated(),
                    });
                } else if reference.requires_io() {
                    core.set_state(PlaybackState::Resolving);
                    notices.push(Notice::Resolving);
                    let resolver = self.resolver.clone();
                    let randomized = core.params.randomized;
                    let control_tx = self.control_tx.clone();
                    tokio::task::spawn_blocking(move || {
                        let result = resolver.resolve(&reference, randomized);
                        // Dropped silently if the session stopped meanwhile
                        let _ = control_tx.send(Control::Resolved(result));
                    });
                } else {
                    let result = self.resolver.resolve(&reference, core.params.randomized);
                    self.on_resolved(&mut core, result, &mut notices);
                }
            }
        }
        notices
    }

    fn on_control(&self, control: Control) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut core = lock(&self.core);
        if core.is_stopped() {
            return notices;
        }
        match control {
            Control::Resolved(result) => self.on_resolved(&mut core, result, &mut notices),
            Control::ConnectivityLost => {
                let shape = KindShape::of(core.kind);
                let action = decide(shape, Trigger::NetworkLost, core.on_fallback);
                self.apply(&mut core, action, &mut notices, || EngineError::NetworkLost);
            }
        }
        notices
    }

    fn on_resolved(
        &self,
        core: &mut SessionCore,
        result: ResolveResult<ResolvedSource>,
        notices: &mut Vec<Notice>,
    ) {
        let reason = match result {
            Ok(resolved) if !resolved.tracks.is_empty() => {
                notices.push(Notice::Resolved(resolved.kind, resolved.tracks.len()));
                core.install(resolved.kind, resolved.tracks);
                self.prepare(core, notices);
                return;
            }
            Ok(resolved) => {
                core.kind = resolved.kind;
                format!("no playable tracks found for {} source", resolved.kind)
            }
            Err(e) => e.to_string(),
        };

        warn!(kind = %core.kind, reason = %reason, "Source resolved empty, using fallback tone");
        notices.push(Notice::ResolutionEmpty(reason.clone()));
        let action = decide(KindShape::of(core.kind), Trigger::ResolutionEmpty, core.on_fallback);
        self.apply(core, action, notices, || EngineError::ResolutionEmpty(reason));
    }

    fn on_player_event(&self, event: PlayerEvent) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut core = lock(&self.core);
        if !core.is_current(event.generation) {
            trace!(generation = event.generation, "Dropping stale player event");
            return notices;
        }

        match event.kind {
            PlayerEventKind::Prepared => match core.start_player() {
                Ok(()) => self.on_started(&mut core, &mut notices),
                Err(e) => self.on_player_error(&mut core, e, &mut notices),
            },
            PlayerEventKind::Failed(e) => self.on_player_error(&mut core, e, &mut notices),
            PlayerEventKind::Completed => {
                // Completion never ends a session: lists advance, single tracks restart
                let action = decide(KindShape::of(core.kind), Trigger::Completed, core.on_fallback);
                debug!(index = core.current_index, action = ?action, "Track completed");
                if action == RecoveryAction::Advance {
                    self.advance(&mut core, &mut notices);
                } else {
                    self.prepare(&mut core, &mut notices);
                }
            }
        }
        notices
    }

    fn on_started(&self, core: &mut SessionCore, notices: &mut Vec<Notice>) {
        core.set_state(PlaybackState::Playing);
        core.metrics.record_track_started();
        if let Some(track) = core.current_track() {
            debug!(index = core.current_index, track = %track, "Track playing");
        }

        if !core.is_audible() {
            let control_tx = self.control_tx.clone();
            core.become_audible(move || {
                let _ = control_tx.send(Control::ConnectivityLost);
            });
            notices.push(Notice::FirstSound);
        }
    }

    fn on_player_error(&self, core: &mut SessionCore, e: PlayerError, notices: &mut Vec<Notice>) {
        let shape = KindShape::of(core.kind);
        let action = decide(shape, Trigger::PlaybackError, core.on_fallback);
        if let Some(track) = core.current_track() {
            warn!(track = %track, error = %e, action = ?action, "Track failed");
        }
        if action != RecoveryAction::Fatal {
            notices.push(Notice::Recovery(action, e.clone()));
        }
        self.apply(core, action, notices, || EngineError::FallbackFailed(e));
    }

    /// Carry out a recovery decision. `fatal` builds the error reported if
    /// the action is [`RecoveryAction::Fatal`].
    fn apply(
        &self,
        core: &mut SessionCore,
        action: RecoveryAction,
        notices: &mut Vec<Notice>,
        fatal: impl FnOnce() -> EngineError,
    ) {
        match action {
            RecoveryAction::SubstituteFallback => {
                core.substitute_fallback();
                self.prepare(core, notices);
            }
            RecoveryAction::SkipTrack => {
                core.metrics.record_skip();
                let index = core.current_index;
                if index < core.tracks.len() {
                    core.tracks.remove(index);
                }
                if core.tracks.is_empty() {
                    info!("Every track failed, using fallback tone");
                    self.apply(core, RecoveryAction::SubstituteFallback, notices, fatal);
                    return;
                }
                if core.current_index >= core.tracks.len() {
                    self.wrap(core);
                }
                self.prepare(core, notices);
            }
            RecoveryAction::Advance => self.advance(core, notices),
            RecoveryAction::Restart => {
                self.prepare(core, notices);
            }
            RecoveryAction::Fatal => {
                let error = fatal();
                error!(error = %error, "Session failed");
                if core.teardown() {
                    notices.push(Notice::Fatal(error));
                    notices.push(Notice::Stopped);
                }
            }
        }
    }

    fn advance(&self, core: &mut SessionCore, notices: &mut Vec<Notice>) {
        core.set_state(PlaybackState::Advancing);
        core.current_index += 1;
        if core.current_index >= core.tracks.len() {
            self.wrap(core);
        }
        self.prepare(core, notices);
    }

    fn wrap(&self, core: &mut SessionCore) {
        core.current_index = 0;
        if core.params.randomized {
            core.reshuffle();
            debug!("Track list wrapped and reshuffled");
        } else {
            debug!("Track list wrapped");
        }
    }

    fn prepare(&self, core: &mut SessionCore, notices: &mut Vec<Notice>) {
        if let Some(track) = core.prepare_current() {
            notices.push(Notice::TrackChanged(track));
        }
    }
}

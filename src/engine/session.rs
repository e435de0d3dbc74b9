//! The mutable aggregate behind one playback session

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{EngineServices, PlaybackMode, PlaybackState, SessionSnapshot};
use crate::audio::{MediaPlayer, PlayerEvent, PlayerEvents};
use crate::metrics::SessionMetrics;
use crate::network::NetworkMonitorHandle;
use crate::source::{SourceKind, Track};
use crate::volume::{AudioStream, VolumeRamp};

/// Fixed per-session parameters
#[derive(Debug, Clone)]
pub(crate) struct SessionParams {
    pub mode: PlaybackMode,
    pub stream: AudioStream,
    pub randomized: bool,
    pub volume_target: u32,
    pub ramp_enabled: bool,
    pub ramp_step: Duration,
    pub vibrate: bool,
}

/// State owned by one session.
///
/// Lives behind a mutex shared by the controlling task and the
/// [`SessionHandle`](super::SessionHandle), so a stop from any thread
/// completes teardown before it returns.
pub(crate) struct SessionCore {
    pub params: SessionParams,
    pub state: PlaybackState,
    pub kind: SourceKind,
    pub tracks: Vec<Track>,
    pub current_index: usize,
    pub on_fallback: bool,
    pub metrics: SessionMetrics,
    services: EngineServices,
    state_tx: watch::Sender<PlaybackState>,
    player: Box<dyn MediaPlayer>,
    player_tx: mpsc::UnboundedSender<PlayerEvent>,
    generation: u64,
    ramp: Option<VolumeRamp>,
    monitor: Option<NetworkMonitorHandle>,
    saved_volume: Option<u32>,
    focus_held: bool,
    vibrating: bool,
    audible: bool,
}

impl SessionCore {
    pub fn new(
        services: EngineServices,
        params: SessionParams,
        kind: SourceKind,
        player_tx: mpsc::UnboundedSender<PlayerEvent>,
    ) -> (Self, watch::Receiver<PlaybackState>) {
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);
        let player = services.backend.create_player(params.stream);
        let core = Self {
            params,
            state: PlaybackState::Idle,
            kind,
            tracks: Vec::new(),
            current_index: 0,
            on_fallback: false,
            metrics: SessionMetrics::new(),
            services,
            state_tx,
            player,
            player_tx,
            generation: 0,
            ramp: None,
            monitor: None,
            saved_volume: None,
            focus_held: false,
            vibrating: false,
            audible: false,
        };
        (core, state_rx)
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Session state change");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    /// Whether `generation` belongs to the track being prepared or played
    pub fn is_current(&self, generation: u64) -> bool {
        !self.is_stopped() && generation == self.generation
    }

    /// Whether the first track has started
    pub fn is_audible(&self) -> bool {
        self.audible
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Single-track kinds and the fallback tone loop instead of completing
    pub fn loops_current(&self) -> bool {
        self.on_fallback || !self.kind.is_list_based()
    }

    pub fn start_vibration(&mut self) {
        if self.params.vibrate && !self.vibrating {
            self.services.vibrator.start();
            self.vibrating = true;
        }
    }

    /// Install a new track list and point at its first entry
    pub fn install(&mut self, kind: SourceKind, tracks: Vec<Track>) {
        self.kind = kind;
        self.tracks = tracks;
        self.current_index = 0;
        self.on_fallback = kind == SourceKind::Fallback;
    }

    /// Replace the list with the bundled tone
    pub fn substitute_fallback(&mut self) {
        self.tracks = vec![Track::fallback()];
        self.current_index = 0;
        self.on_fallback = true;
        self.metrics.record_fallback();
        // The tone is local; a later outage must not stop it
        if let Some(mut monitor) = self.monitor.take() {
            monitor.detach();
        }
    }

    /// Shuffle the list again for the next pass
    pub fn reshuffle(&mut self) {
        self.services.shuffler.shuffle(&mut self.tracks);
        for (position, track) in self.tracks.iter_mut().enumerate() {
            track.position = position;
        }
    }

    /// Hand the current track to the player; returns it for observers
    pub fn prepare_current(&mut self) -> Option<Track> {
        let track = self.current_track()?.clone();
        self.generation += 1;
        self.set_state(PlaybackState::Preparing);
        let looping = self.loops_current();
        debug!(
            generation = self.generation,
            index = self.current_index,
            uri = %track.uri,
            looping,
            "Preparing track"
        );
        self.player.prepare(
            &track,
            looping,
            PlayerEvents::new(self.generation, self.player_tx.clone()),
        );
        Some(track)
    }

    pub fn start_player(&mut self) -> crate::error::PlayerResult<()> {
        self.player.start()
    }

    /// Apply the session's volume and claim shared resources.
    ///
    /// Runs once, when the first track actually starts. `on_lost` is wired
    /// to the connectivity monitor for streaming sessions.
    pub fn become_audible(&mut self, on_lost: impl Fn() + Send + Sync + 'static) {
        if self.audible {
            return;
        }
        self.audible = true;

        let stream = self.params.stream;
        let volume = &self.services.volume;
        self.saved_volume = Some(volume.volume(stream));

        self.focus_held = self.services.focus.request(stream);
        if !self.focus_held {
            warn!(stream = ?stream, "Audio focus denied, playing anyway");
        }

        let target = self.params.volume_target;
        self.ramp = Some(if self.params.ramp_enabled {
            VolumeRamp::start(volume.clone(), stream, target, self.params.ramp_step)
        } else {
            VolumeRamp::fixed(volume.as_ref(), stream, target)
        });

        if self.kind.is_streaming() && !self.on_fallback {
            self.monitor = Some(NetworkMonitorHandle::attach(
                self.services.connectivity.clone(),
                on_lost,
            ));
        }

        info!(
            mode = %self.params.mode,
            kind = %self.kind,
            target,
            ramp = self.params.ramp_enabled,
            "Alarm audible"
        );
    }

    /// Release everything the session holds; returns false if it was
    /// already stopped.
    pub fn teardown(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }

        // Events from the abandoned prepare no longer match
        self.generation += 1;
        self.player.stop();

        if let Some(mut ramp) = self.ramp.take() {
            ramp.stop();
        }
        if let Some(level) = self.saved_volume.take() {
            self.services.volume.set_volume(self.params.stream, level);
            debug!(level, "Stream volume restored");
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.detach();
        }
        if std::mem::take(&mut self.focus_held) {
            self.services.focus.abandon();
        }
        if std::mem::take(&mut self.vibrating) {
            self.services.vibrator.cancel();
        }

        self.set_state(PlaybackState::Stopped);
        self.metrics.log_summary();
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            mode: self.params.mode,
            kind: self.kind,
            tracks: self.tracks.clone(),
            current_index: self.current_index,
            on_fallback: self.on_fallback,
            volume_target: self.params.volume_target,
        }
    }
}

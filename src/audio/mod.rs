//! Single-track player capability
//!
//! The engine drives exactly one [`MediaPlayer`] per session. Players never
//! call back into the engine directly: preparation, completion and failure
//! are reported through a [`PlayerEvents`] sink that feeds the session's
//! controlling task, tagged with the generation of the prepare they belong
//! to so late events from an abandoned track are dropped.
//!
//! With the `audio` feature the desktop backend plays through rodio;
//! without it a stub backend logs instead of making sound. Remote tracks
//! are read progressively through [`remote::RemoteStream`].

pub mod remote;

#[cfg(feature = "audio")]
mod player;

#[cfg(feature = "audio")]
pub use player::DesktopBackend;

#[cfg(not(feature = "audio"))]
mod stub;

#[cfg(not(feature = "audio"))]
pub use stub::DesktopBackend;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{PlayerError, PlayerResult};
use crate::source::Track;
use crate::volume::AudioStream;

/// What happened to a prepared track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// Ready to start
    Prepared,
    /// Reached the end (never sent for looping tracks)
    Completed,
    /// Could not be opened, decoded or played
    Failed(PlayerError),
}

/// Event reported by a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    /// Generation of the prepare this event belongs to
    pub generation: u64,
    /// What happened
    pub kind: PlayerEventKind,
}

/// Sink through which a player reports on one prepared track
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerEvents {
    /// Sink tagged with `generation`
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { generation, tx }
    }

    /// Sink plus the receiving end, for driving a player on its own
    pub fn channel(generation: u64) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(generation, tx), rx)
    }

    /// Generation this sink reports for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The track is ready to start
    pub fn prepared(&self) {
        self.send(PlayerEventKind::Prepared);
    }

    /// The track played to its end
    pub fn completed(&self) {
        self.send(PlayerEventKind::Completed);
    }

    /// The track failed
    pub fn failed(&self, error: PlayerError) {
        self.send(PlayerEventKind::Failed(error));
    }

    fn send(&self, kind: PlayerEventKind) {
        let event = PlayerEvent {
            generation: self.generation,
            kind,
        };
        // The session may already be gone
        if self.tx.send(event).is_err() {
            trace!(generation = self.generation, "Dropping player event for finished session");
        }
    }
}

/// One underlying single-track player
pub trait MediaPlayer: Send {
    /// Begin preparing `track` asynchronously; the outcome arrives on
    /// `events`. Replaces whatever was prepared before.
    fn prepare(&mut self, track: &Track, looping: bool, events: PlayerEvents);

    /// Start the prepared track
    fn start(&mut self) -> PlayerResult<()>;

    /// Stop and release the current track; safe to call repeatedly
    fn stop(&mut self);
}

/// Factory for players
pub trait MediaBackend: Send + Sync {
    /// Create a player that outputs on `stream`
    fn create_player(&self, stream: AudioStream) -> Box<dyn MediaPlayer>;
}

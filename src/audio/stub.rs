//! Stub backend when the audio feature is disabled
//!
//! Tracks are reported prepared straight away and "play" forever, which keeps
//! the session logic observable from the logs on machines without sound.

use std::sync::Arc;

use tracing::{debug, info};

use super::{MediaBackend, MediaPlayer, PlayerEvents};
use crate::error::PlayerResult;
use crate::source::Track;
use crate::volume::{AudioStream, SoftwareMixer};

/// Backend that logs instead of making sound
pub struct DesktopBackend {
    mixer: Arc<SoftwareMixer>,
}

impl DesktopBackend {
    /// Create the stub backend
    pub fn new(mixer: Arc<SoftwareMixer>) -> PlayerResult<Self> {
        debug!("Audio feature not enabled, using stub backend");
        Ok(Self { mixer })
    }
}

impl MediaBackend for DesktopBackend {
    fn create_player(&self, stream: AudioStream) -> Box<dyn MediaPlayer> {
        Box::new(StubPlayer {
            stream,
            mixer: Arc::clone(&self.mixer),
            current: None,
        })
    }
}

struct StubPlayer {
    stream: AudioStream,
    mixer: Arc<SoftwareMixer>,
    current: Option<Track>,
}

impl MediaPlayer for StubPlayer {
    fn prepare(&mut self, track: &Track, looping: bool, events: PlayerEvents) {
        debug!(uri = %track.uri, looping, "Stub prepare");
        self.current = Some(track.clone());
        events.prepared();
    }

    fn start(&mut self) -> PlayerResult<()> {
        if let Some(track) = &self.current {
            info!(
                track = %track,
                stream = ?self.stream,
                gain = self.mixer.gain(self.stream),
                "Playing (audio disabled)"
            );
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(track) = self.current.take() {
            debug!(uri = %track.uri, "Stub stop");
        }
    }
}

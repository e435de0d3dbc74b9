//! Device services the engine talks to
//!
//! Audio focus, call state, vibration and shuffling are seams: the engine
//! only sees these traits, and the host supplies implementations. The
//! desktop implementations here are what the bundled binary uses.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use tracing::debug;

use crate::source::Track;
use crate::volume::AudioStream;

/// Exclusive audio output ownership
pub trait AudioFocus: Send + Sync {
    /// Ask for focus on `stream`; returns whether it was granted
    fn request(&self, stream: AudioStream) -> bool;

    /// Give focus back; safe to call when not held
    fn abandon(&self);
}

/// Telephony state
pub trait CallStateProvider: Send + Sync {
    /// Whether a call is ringing or in progress
    fn is_call_active(&self) -> bool;
}

/// Vibration motor
pub trait Vibrator: Send + Sync {
    /// Start the repeating alarm pattern
    fn start(&self);

    /// Stop vibrating; safe to call when idle
    fn cancel(&self);
}

/// Reorders track lists for random playback
pub trait Shuffler: Send + Sync {
    /// Shuffle `tracks` in place
    fn shuffle(&self, tracks: &mut [Track]);
}

/// Focus bookkeeping for hosts without a focus arbiter.
///
/// Always grants focus and records whether it is held.
#[derive(Debug, Default)]
pub struct FocusTracker {
    held: AtomicBool,
    requests: AtomicUsize,
}

impl FocusTracker {
    /// Create a tracker with focus released
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether focus is currently held
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// How many times focus has been requested
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl AudioFocus for FocusTracker {
    fn request(&self, stream: AudioStream) -> bool {
        debug!(stream = ?stream, "Audio focus acquired");
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        true
    }

    fn abandon(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            debug!("Audio focus abandoned");
        }
    }
}

/// Call state for devices without telephony
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelephony;

impl CallStateProvider for NoTelephony {
    fn is_call_active(&self) -> bool {
        false
    }
}

/// Vibrator for devices without a motor
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVibrator;

impl Vibrator for NoVibrator {
    fn start(&self) {
        debug!("Vibration requested but no vibrator is available");
    }

    fn cancel(&self) {}
}

/// Uniform random shuffle
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomShuffler;

impl Shuffler for RandomShuffler {
    fn shuffle(&self, tracks: &mut [Track]) {
        tracks.shuffle(&mut rand::thread_rng());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_tracker() {
        let focus = FocusTracker::new();
        assert!(!focus.is_held());
        assert!(focus.request(AudioStream::Alarm));
        assert!(focus.is_held());
        focus.abandon();
        focus.abandon();
        assert!(!focus.is_held());
        assert_eq!(focus.requests(), 1);
    }

    #[test]
    fn test_random_shuffle_keeps_tracks() {
        let mut tracks: Vec<Track> = (0..20).map(|i| Track::new(format!("/t/{i}.mp3"), i)).collect();
        RandomShuffler.shuffle(&mut tracks);
        let mut positions: Vec<_> = tracks.iter().map(|t| t.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..20).collect::<Vec<_>>());
    }
}

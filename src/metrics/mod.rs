//! Playback statistics for a single session
//!
//! Collected by the controller while a session runs and logged once at
//! teardown, so slow starts and flaky sources show up in the logs.

use std::time::{Duration, Instant};

/// Time to first sound above which a warning is logged
pub const SLOW_START_THRESHOLD: Duration = Duration::from_secs(5);

/// A simple timer for measuring operation duration
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time since timer started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Counters for one playback session
#[derive(Debug)]
pub struct SessionMetrics {
    timer: Timer,
    first_sound: Option<Duration>,
    tracks_started: u64,
    skips: u64,
    fallbacks: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            timer: Timer::start(),
            first_sound: None,
            tracks_started: 0,
            skips: 0,
            fallbacks: 0,
        }
    }

    /// Record that a track started playing
    pub fn record_track_started(&mut self) {
        self.tracks_started += 1;
        if self.first_sound.is_none() {
            let elapsed = self.timer.elapsed();
            self.first_sound = Some(elapsed);
            if elapsed > SLOW_START_THRESHOLD {
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Slow start to first sound"
                );
            }
        }
    }

    /// Record a failed track being skipped
    pub fn record_skip(&mut self) {
        self.skips += 1;
    }

    /// Record a fallback substitution
    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    /// Time from session start to the first track starting
    pub fn time_to_first_sound(&self) -> Option<Duration> {
        self.first_sound
    }

    /// Get total tracks started
    pub fn tracks_started(&self) -> u64 {
        self.tracks_started
    }

    /// Get total skipped tracks
    pub fn skips(&self) -> u64 {
        self.skips
    }

    /// Get total fallback substitutions
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks
    }

    /// Session age
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Log a summary of the session
    pub fn log_summary(&self) {
        tracing::info!(
            duration_ms = self.elapsed().as_millis() as u64,
            first_sound_ms = self.first_sound.map(|d| d.as_millis() as u64),
            tracks_started = self.tracks_started,
            skips = self.skips,
            fallbacks = self.fallbacks,
            "Playback session summary"
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

//! Device stream volume
//!
//! Stream volume is global device state: the engine snapshots it before a
//! session first touches it and puts it back on stop.

pub mod ramp;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

pub use ramp::VolumeRamp;

/// Request value meaning "use the current alarm stream volume"
pub const VOLUME_FROM_SYSTEM: i32 = -1;

/// Device audio stream an alarm plays on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStream {
    /// Alarm stream
    Alarm,
    /// Media stream
    Music,
}

/// Stepped per-stream volume
pub trait VolumeControl: Send + Sync {
    /// Current level of `stream`
    fn volume(&self, stream: AudioStream) -> u32;

    /// Highest level of `stream`
    fn max_volume(&self, stream: AudioStream) -> u32;

    /// Set the level of `stream`, clamped to its range
    fn set_volume(&self, stream: AudioStream, level: u32);
}

/// In-process volume levels for hosts that mix in software.
///
/// The desktop backend reads [`SoftwareMixer::gain`] to scale its output.
#[derive(Debug)]
pub struct SoftwareMixer {
    levels: Mutex<[u32; 2]>,
    max: [u32; 2],
}

impl SoftwareMixer {
    /// Mixer with the given scales and starting levels
    pub fn new(alarm_max: u32, alarm_level: u32, music_max: u32, music_level: u32) -> Self {
        Self {
            levels: Mutex::new([alarm_level.min(alarm_max), music_level.min(music_max)]),
            max: [alarm_max, music_max],
        }
    }

    /// Mixer configured from the settings file
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.alarm_max_volume,
            config.initial_alarm_volume,
            config.music_max_volume,
            config.initial_music_volume,
        )
    }

    /// Linear gain (0.0 to 1.0) for `stream`
    pub fn gain(&self, stream: AudioStream) -> f32 {
        let max = self.max_volume(stream);
        if max == 0 {
            return 0.0;
        }
        self.volume(stream) as f32 / max as f32
    }
}

fn slot(stream: AudioStream) -> usize {
    match stream {
        AudioStream::Alarm => 0,
        AudioStream::Music => 1,
    }
}

impl VolumeControl for SoftwareMixer {
    fn volume(&self, stream: AudioStream) -> u32 {
        let levels = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        levels[slot(stream)]
    }

    fn max_volume(&self, stream: AudioStream) -> u32 {
        self.max[slot(stream)]
    }

    fn set_volume(&self, stream: AudioStream, level: u32) {
        let level = level.min(self.max_volume(stream));
        let mut levels = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        levels[slot(stream)] = level;
        debug!(stream = ?stream, level, "Stream volume set");
    }
}

/// Convert a level between two stream scales.
///
/// Proportional with rounding, the same in both directions. A non-zero
/// level never maps to zero.
pub fn scale_volume(level: u32, from_max: u32, to_max: u32) -> u32 {
    if from_max == 0 || to_max == 0 {
        return 0;
    }
    let level = level.min(from_max);
    if level == 0 {
        return 0;
    }
    let scaled = (level as u64 * to_max as u64 + from_max as u64 / 2) / from_max as u64;
    (scaled as u32).clamp(1, to_max)
}

/// Target level on `stream` for a requested alarm volume.
///
/// `requested` is on the alarm-stream scale; [`VOLUME_FROM_SYSTEM`] (or
/// any negative value) takes the current alarm stream level.
pub fn target_volume(requested: i32, stream: AudioStream, control: &dyn VolumeControl) -> u32 {
    let alarm_max = control.max_volume(AudioStream::Alarm);
    let on_alarm_scale = if requested < 0 {
        control.volume(AudioStream::Alarm)
    } else {
        (requested as u32).min(alarm_max)
    };

    match stream {
        AudioStream::Alarm => on_alarm_scale,
        other => scale_volume(on_alarm_scale, alarm_max, control.max_volume(other)),
    }
}

// Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::volume::AudioStream;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device stream alarms play on: "alarm" or "music"
    pub audio_stream: AudioStream,

    /// Delay between volume ramp steps in milliseconds
    pub ramp_step_interval_ms: u64,

    /// Global vibrate toggle, combined with each alarm's own setting
    pub vibrate: bool,

    /// Number of tracks sampled for random playback
    pub random_sample_size: usize,

    /// Volume of the clip played while a phone call is active
    pub in_call_volume: u32,

    /// Number of steps on the alarm stream
    pub alarm_max_volume: u32,

    /// Number of steps on the music stream
    pub music_max_volume: u32,

    /// Alarm stream level the software mixer starts with
    pub initial_alarm_volume: u32,

    /// Music stream level the software mixer starts with
    pub initial_music_volume: u32,

    /// Root of the local music library (defaults to the platform audio dir)
    pub music_dir: Option<PathBuf>,

    /// Connectivity probing used by streaming sessions
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL polled to decide whether the network is reachable
    pub probe_url: String,

    /// Seconds between probes
    pub probe_interval_secs: u64,

    /// Consecutive failed probes before the connection counts as lost
    pub failure_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_stream: AudioStream::Alarm,
            ramp_step_interval_ms: 5000,
            vibrate: true,
            random_sample_size: 50,
            in_call_volume: 1,
            alarm_max_volume: 7,
            music_max_volume: 15,
            initial_alarm_volume: 5,
            initial_music_volume: 8,
            music_dir: None,
            connectivity: ConnectivityConfig::default(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: "http://connectivitycheck.gstatic.com/generate_204".to_string(),
            probe_interval_secs: 10,
            failure_threshold: 2,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = toml::from_str(&content)
                .context("Failed to parse config file")?;
            config.validate()?;
            Ok(config)
        } else {
            // Create default config
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir
            .join("alarm-audio")
            .join("config.toml"))
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.alarm_max_volume == 0 || self.music_max_volume == 0 {
            return Err(ConfigError::InvalidValue(
                "stream max volume must be at least 1".to_string(),
            ));
        }
        if self.in_call_volume > self.alarm_max_volume {
            return Err(ConfigError::InvalidValue(format!(
                "in_call_volume {} exceeds alarm_max_volume {}",
                self.in_call_volume, self.alarm_max_volume
            )));
        }
        if self.ramp_step_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "ramp_step_interval_ms must be positive".to_string(),
            ));
        }
        if self.connectivity.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "connectivity.failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Ramp tick interval
    pub fn ramp_step_interval(&self) -> Duration {
        Duration::from_millis(self.ramp_step_interval_ms)
    }

    /// Number of steps on the given stream
    pub fn max_volume(&self, stream: AudioStream) -> u32 {
        match stream {
            AudioStream::Alarm => self.alarm_max_volume,
            AudioStream::Music => self.music_max_volume,
        }
    }

    /// Music library root, falling back to the platform audio directory
    pub fn music_dir(&self) -> Option<PathBuf> {
        self.music_dir.clone().or_else(dirs::audio_dir)
    }
}

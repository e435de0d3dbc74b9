// Settings file watcher with hot-reload capability

use anyhow::{Context, Result};
use notify::{
    event::{EventKind, ModifyKind},
    Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::config::Config;

const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// Configuration reload event
#[derive(Debug, Clone)]
pub struct ConfigReloadEvent {
    /// Timestamp when the event was generated
    pub timestamp: Instant,
}

/// Settings file watcher
///
/// Alarm settings (target stream, ramp interval, vibrate toggle) are owned by
/// the host application. Edits are picked up here and applied to the next
/// session; a session already ringing keeps the settings it started with.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<ConfigReloadEvent>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Start watching `config_path` for modifications
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut last_event: Option<Instant> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
                    ) {
                        tracing::trace!(kind = ?event.kind, "Ignoring settings file event");
                        return;
                    }

                    // Editors often write several times per save
                    let now = Instant::now();
                    if last_event.is_some_and(|last| now.duration_since(last) < DEBOUNCE_DURATION) {
                        tracing::trace!("Settings change debounced");
                        return;
                    }
                    last_event = Some(now);

                    tracing::info!("Settings file changed, scheduling reload");
                    if let Err(e) = tx.send(ConfigReloadEvent { timestamp: now }) {
                        tracing::error!(error = %e, "Failed to send settings reload event");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Settings watcher error");
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch settings file: {}", config_path.display()))?;

        tracing::info!(path = %config_path.display(), "Settings watcher initialized");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path: config_path,
        })
    }

    /// Path being watched
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to receive a reload event (non-blocking)
    pub fn try_recv(&self) -> Option<ConfigReloadEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain pending events and re-read the settings if any arrived.
    ///
    /// A file that fails to parse or validate is logged and ignored so the
    /// previous settings stay in effect.
    pub fn poll_reload(&self) -> Option<Config> {
        let mut changed = false;
        while self.try_recv().is_some() {
            changed = true;
        }
        if !changed {
            return None;
        }

        match read_config(&self.path) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "Settings reloaded");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Keeping previous settings");
                None
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&content).context("Failed to parse settings")?;
    config.validate()?;
    Ok(config)
}

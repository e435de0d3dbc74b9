// Alarm audio command line
// Fires or previews an alarm sound on the desktop until interrupted

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use alarm_audio::{
    config::Config,
    engine::{EngineServices, EngineSettings, LiveEngine, LiveEvent, PreviewEngine, PreviewListener},
    network::HttpProbeMonitor,
    platform::{FocusTracker, NoTelephony, NoVibrator, RandomShuffler},
    source::{classify, MusicDirLibrary, Track},
    volume::{SoftwareMixer, VOLUME_FROM_SYSTEM},
    ConfigWatcher, DesktopBackend, SessionRequest,
};

const SETTINGS_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "alarm-audio", version, about = "Play alarm sounds the way an alarm clock would")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ring an alarm until Ctrl-C
    Fire(SoundArgs),
    /// Preview a sound until Ctrl-C
    Preview(SoundArgs),
    /// Show how a sound reference is classified
    Classify {
        /// Sound reference
        reference: String,
    },
}

#[derive(Args)]
struct SoundArgs {
    /// Sound reference: a file, folder/, playlist.m3u, random, silent, ...
    reference: String,

    /// Alarm-scale volume; -1 keeps the current alarm volume
    #[arg(long, default_value_t = VOLUME_FROM_SYSTEM, allow_hyphen_values = true)]
    volume: i32,

    /// Ramp the volume up from the lowest step
    #[arg(long)]
    ramp: bool,

    /// Shuffle list sources
    #[arg(long)]
    random: bool,

    /// Ring as a pre-alarm
    #[arg(long)]
    pre_alarm: bool,

    /// Do not vibrate
    #[arg(long)]
    no_vibrate: bool,
}

impl SoundArgs {
    fn request(&self) -> SessionRequest {
        SessionRequest {
            sound_reference: self.reference.clone(),
            volume: self.volume,
            vibrate: !self.no_vibrate,
            increasing_volume: self.ramp,
            random_playback: self.random,
            is_pre_alarm: self.pre_alarm,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Classify { reference } = &cli.command {
        let reference = classify(reference);
        println!("kind:      {}", reference.kind());
        println!("delegated: {}", reference.is_delegated());
        println!("sniffing:  {}", reference.needs_sniffing());
        return Ok(());
    }

    let config = Config::load().context("Failed to load settings")?;
    info!(config = ?config, "Configuration loaded");

    let services = desktop_services(&config)?;
    let settings = EngineSettings::from_config(&config);
    let watcher = watch_settings();

    match cli.command {
        Command::Fire(args) => fire(services, settings, watcher, args.request()).await,
        Command::Preview(args) => preview(services, settings, args.request()).await,
        Command::Classify { .. } => Ok(()),
    }
}

fn desktop_services(config: &Config) -> Result<EngineServices> {
    let mixer = Arc::new(SoftwareMixer::from_config(config));
    let backend =
        DesktopBackend::new(Arc::clone(&mixer)).context("Failed to open audio output")?;

    Ok(EngineServices {
        backend: Arc::new(backend),
        volume: mixer,
        focus: Arc::new(FocusTracker::new()),
        connectivity: HttpProbeMonitor::spawn(&config.connectivity),
        telephony: Arc::new(NoTelephony),
        vibrator: Arc::new(NoVibrator),
        library: Arc::new(MusicDirLibrary::new(config.music_dir())),
        shuffler: Arc::new(RandomShuffler),
    })
}

fn watch_settings() -> Option<ConfigWatcher> {
    let watcher = Config::config_path().and_then(ConfigWatcher::new);
    match watcher {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "Settings hot-reload disabled");
            None
        }
    }
}

async fn fire(
    services: EngineServices,
    settings: EngineSettings,
    watcher: Option<ConfigWatcher>,
    request: SessionRequest,
) -> Result<()> {
    let (engine, mut events) = LiveEngine::new(services, settings);
    engine.start(&request);

    let mut settings_poll = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C, stopping alarm");
                engine.stop();
                break;
            }
            Some(event) = events.recv() => match event {
                LiveEvent::AlarmStarted { mode } => info!(mode = %mode, "Alarm ringing"),
                LiveEvent::AlarmDone { mode } => {
                    info!(mode = %mode, "Alarm finished");
                    break;
                }
                LiveEvent::Notification(notification) => {
                    error!(
                        title = %notification.title,
                        at = %notification.timestamp.format("%H:%M:%S"),
                        "{}",
                        notification.message
                    );
                }
            },
            _ = settings_poll.tick() => {
                if let Some(config) = watcher.as_ref().and_then(ConfigWatcher::poll_reload) {
                    engine.update_settings(EngineSettings::from_config(&config));
                }
            }
        }
    }
    Ok(())
}

async fn preview(
    services: EngineServices,
    settings: EngineSettings,
    request: SessionRequest,
) -> Result<()> {
    let engine = PreviewEngine::new(services, settings);
    let session = engine.start(&request, Arc::new(LogListener));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, stopping preview");
            session.stop();
        }
        _ = session.stopped() => {}
    }
    Ok(())
}

/// Reports preview callbacks to the log
struct LogListener;

impl PreviewListener for LogListener {
    fn on_error(&self, message: &str) {
        warn!("{message}");
    }

    fn on_info(&self, message: &str) {
        info!("{message}");
    }

    fn on_track_changed(&self, track: &Track) {
        info!(position = track.position, "Now playing: {}", track.display_name());
    }

    fn start_progress(&self) {
        info!("Scanning...");
    }

    fn stop_progress(&self) {
        info!("Scan finished");
    }
}

// Test doubles for driving the engine without audio hardware

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alarm_audio::audio::{MediaBackend, MediaPlayer, PlayerEvents};
use alarm_audio::engine::{EngineServices, EngineSettings};
use alarm_audio::error::{PlayerError, PlayerResult, ResolveError, ResolveResult};
use alarm_audio::network::ManualConnectivity;
use alarm_audio::platform::{CallStateProvider, FocusTracker, Shuffler, Vibrator};
use alarm_audio::source::{LibraryItem, MediaLibrary, Track};
use alarm_audio::volume::{AudioStream, SoftwareMixer, VolumeControl};

pub const RAMP_STEP: Duration = Duration::from_millis(100);

/// What the scripted player did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerOp {
    Prepare { player: usize, uri: String },
    Start { player: usize, uri: String },
    Stop { player: usize },
}

#[derive(Default)]
struct Script {
    ops: Vec<PlayerOp>,
    current: Option<(usize, PlayerEvents)>,
    prepared: HashMap<usize, String>,
    players: usize,
}

/// Backend whose players succeed unless the file name contains "bad", and
/// never answer for names containing "hang". Tracks complete only on request.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    fail_fallback: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the bundled tone fail too
    pub fn fail_fallback(&self) {
        self.fail_fallback.store(true, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<PlayerOp> {
        self.lock().ops.clone()
    }

    pub fn players_created(&self) -> usize {
        self.lock().players
    }

    pub fn prepared_uris(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                PlayerOp::Prepare { uri, .. } => Some(uri),
                _ => None,
            })
            .collect()
    }

    pub fn started_uris(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                PlayerOp::Start { uri, .. } => Some(uri),
                _ => None,
            })
            .collect()
    }

    /// Report the current track as finished
    pub fn complete_current(&self) {
        if let Some((_, events)) = &self.lock().current {
            events.completed();
        }
    }

    /// Report the current track as failed
    pub fn fail_current(&self) {
        if let Some((_, events)) = &self.lock().current {
            events.failed(PlayerError::Decode("scripted failure".to_string()));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MediaBackend for ScriptedBackend {
    fn create_player(&self, _stream: AudioStream) -> Box<dyn MediaPlayer> {
        let mut script = self.lock();
        script.players += 1;
        Box::new(ScriptedPlayer {
            id: script.players,
            script: Arc::clone(&self.script),
            fail_fallback: self.fail_fallback.load(Ordering::SeqCst),
        })
    }
}

struct ScriptedPlayer {
    id: usize,
    script: Arc<Mutex<Script>>,
    fail_fallback: bool,
}

impl MediaPlayer for ScriptedPlayer {
    fn prepare(&mut self, track: &Track, _looping: bool, events: PlayerEvents) {
        let mut script = self.script.lock().unwrap();
        script.ops.push(PlayerOp::Prepare {
            player: self.id,
            uri: track.uri.clone(),
        });
        script.prepared.insert(self.id, track.uri.clone());
        script.current = Some((self.id, events.clone()));
        drop(script);

        // Only the file name counts; temp dirs have random names
        let name = track.uri.rsplit('/').next().unwrap_or(&track.uri);
        if name.contains("hang") {
            return;
        }
        if name.contains("bad") || (track.is_fallback() && self.fail_fallback) {
            events.failed(PlayerError::Decode(format!("cannot decode {}", track.uri)));
        } else {
            events.prepared();
        }
    }

    fn start(&mut self) -> PlayerResult<()> {
        let mut script = self.script.lock().unwrap();
        let uri = script.prepared.get(&self.id).cloned().unwrap_or_default();
        script.ops.push(PlayerOp::Start { player: self.id, uri });
        Ok(())
    }

    fn stop(&mut self) {
        let mut script = self.script.lock().unwrap();
        script.ops.push(PlayerOp::Stop { player: self.id });
        script.prepared.remove(&self.id);
        if script.current.as_ref().is_some_and(|(id, _)| *id == self.id) {
            script.current = None;
        }
    }
}

#[derive(Default)]
pub struct FixedTelephony {
    in_call: AtomicBool,
}

impl FixedTelephony {
    pub fn set_in_call(&self, in_call: bool) {
        self.in_call.store(in_call, Ordering::SeqCst);
    }
}

impl CallStateProvider for FixedTelephony {
    fn is_call_active(&self) -> bool {
        self.in_call.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingVibrator {
    starts: AtomicUsize,
    cancels: AtomicUsize,
    active: AtomicBool,
}

impl CountingVibrator {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Vibrator for CountingVibrator {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Deterministic "shuffle": reverses the list
pub struct ReverseShuffler;

impl Shuffler for ReverseShuffler {
    fn shuffle(&self, tracks: &mut [Track]) {
        tracks.reverse();
    }
}

/// Library with a fixed random pool and no albums, artists or playlists
#[derive(Default)]
pub struct FakeLibrary {
    random: Mutex<Vec<LibraryItem>>,
}

impl FakeLibrary {
    pub fn set_random(&self, uris: &[&str]) {
        *self.random.lock().unwrap() = uris
            .iter()
            .map(|uri| LibraryItem {
                uri: uri.to_string(),
                title: uri.to_string(),
            })
            .collect();
    }
}

impl MediaLibrary for FakeLibrary {
    fn random_tracks(&self, limit: usize) -> ResolveResult<Vec<LibraryItem>> {
        Ok(self.random.lock().unwrap().iter().take(limit).cloned().collect())
    }

    fn album_tracks(&self, album_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        Err(ResolveError::LibraryUnavailable(format!("album {album_id}")))
    }

    fn artist_tracks(&self, artist_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        Err(ResolveError::LibraryUnavailable(format!("artist {artist_id}")))
    }

    fn playlist_tracks(&self, playlist_id: &str) -> ResolveResult<Vec<LibraryItem>> {
        Err(ResolveError::LibraryUnavailable(format!("playlist {playlist_id}")))
    }
}

/// Fakes wired into a set of engine services
pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub mixer: Arc<SoftwareMixer>,
    pub focus: Arc<FocusTracker>,
    pub connectivity: Arc<ManualConnectivity>,
    pub telephony: Arc<FixedTelephony>,
    pub vibrator: Arc<CountingVibrator>,
    pub library: Arc<FakeLibrary>,
    pub shuffler: Arc<dyn Shuffler>,
}

impl Harness {
    /// Alarm stream has 7 steps and starts at 5
    pub fn new() -> Self {
        Self {
            backend: Arc::new(ScriptedBackend::new()),
            mixer: Arc::new(SoftwareMixer::new(7, 5, 15, 8)),
            focus: Arc::new(FocusTracker::new()),
            connectivity: Arc::new(ManualConnectivity::new()),
            telephony: Arc::new(FixedTelephony::default()),
            vibrator: Arc::new(CountingVibrator::default()),
            library: Arc::new(FakeLibrary::default()),
            shuffler: Arc::new(ReverseShuffler),
        }
    }

    pub fn services(&self) -> EngineServices {
        EngineServices {
            backend: self.backend.clone(),
            volume: self.mixer.clone(),
            focus: self.focus.clone(),
            connectivity: self.connectivity.clone(),
            telephony: self.telephony.clone(),
            vibrator: self.vibrator.clone(),
            library: self.library.clone(),
            shuffler: self.shuffler.clone(),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            ramp_step_interval: RAMP_STEP,
            ..EngineSettings::default()
        }
    }

    pub fn alarm_volume(&self) -> u32 {
        self.mixer.volume(AudioStream::Alarm)
    }
}

/// Poll `condition` until it holds; panics after about five seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Folder of three empty "audio" files named a, b and c
pub fn three_track_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    dir
}

/// Reference string for a folder (trailing slash marks a folder)
pub fn folder_reference(dir: &Path) -> String {
    format!("{}/", dir.display())
}

/// Write a playlist file into `dir`
pub fn write_playlist(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

/// File name of a track URI
pub fn file_name(uri: &str) -> String {
    Path::new(uri)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| uri.to_string())
}

//! Desktop player backend using rodio
//!
//! rodio's output stream cannot leave the thread that opened it, so one
//! audio thread owns the stream and every sink. Players talk to it over a
//! command channel. Media is opened and decoded on short-lived loader
//! threads so a slow connection never holds up stop requests. Remote tracks
//! are decoded as they download.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use super::remote::RemoteStream;
use super::{MediaBackend, MediaPlayer, PlayerEvents};
use crate::error::{PlayerError, PlayerResult};
use crate::source::Track;
use crate::volume::{AudioStream, SoftwareMixer};

/// How often the audio thread checks for finished tracks and gain changes
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SAMPLE_RATE: u32 = 44100;

/// Decoded, ready-to-queue track
type Media = Box<dyn Source<Item = f32> + Send>;

enum AudioCommand {
    Prepare {
        player: u64,
        stream: AudioStream,
        track: Track,
        looping: bool,
        events: PlayerEvents,
    },
    Loaded {
        player: u64,
        generation: u64,
        media: PlayerResult<Media>,
    },
    Start {
        player: u64,
    },
    Stop {
        player: u64,
    },
}

/// Backend that plays on the default output device
pub struct DesktopBackend {
    commands: Sender<AudioCommand>,
    next_player: AtomicU64,
}

impl DesktopBackend {
    /// Open the default output device; gain follows `mixer`
    pub fn new(mixer: Arc<SoftwareMixer>) -> PlayerResult<Self> {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let loopback = commands.clone();

        thread::Builder::new()
            .name("alarm-audio-output".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlayerError::Output(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                AudioThread::new(handle, mixer, loopback).run(receiver);
                drop(stream);
            })
            .map_err(|e| PlayerError::Output(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlayerError::Output("audio thread exited during startup".to_string()))??;

        info!("Audio output initialized");
        Ok(Self {
            commands,
            next_player: AtomicU64::new(1),
        })
    }
}

impl MediaBackend for DesktopBackend {
    fn create_player(&self, stream: AudioStream) -> Box<dyn MediaPlayer> {
        Box::new(DesktopPlayer {
            id: self.next_player.fetch_add(1, Ordering::Relaxed),
            stream,
            commands: self.commands.clone(),
        })
    }
}

struct DesktopPlayer {
    id: u64,
    stream: AudioStream,
    commands: Sender<AudioCommand>,
}

impl MediaPlayer for DesktopPlayer {
    fn prepare(&mut self, track: &Track, looping: bool, events: PlayerEvents) {
        debug!(player = self.id, stream = ?self.stream, uri = %track.uri, looping, "Preparing track");
        let command = AudioCommand::Prepare {
            player: self.id,
            stream: self.stream,
            track: track.clone(),
            looping,
            events: events.clone(),
        };
        if self.commands.send(command).is_err() {
            events.failed(PlayerError::Output("audio thread is not running".to_string()));
        }
    }

    fn start(&mut self) -> PlayerResult<()> {
        self.commands
            .send(AudioCommand::Start { player: self.id })
            .map_err(|_| PlayerError::Output("audio thread is not running".to_string()))
    }

    fn stop(&mut self) {
        let _ = self.commands.send(AudioCommand::Stop { player: self.id });
    }
}

impl Drop for DesktopPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PendingTrack {
    generation: u64,
    looping: bool,
    events: PlayerEvents,
    stream: AudioStream,
}

struct ActiveTrack {
    sink: Sink,
    looping: bool,
    started: bool,
    events: PlayerEvents,
    stream: AudioStream,
}

struct AudioThread {
    handle: OutputStreamHandle,
    mixer: Arc<SoftwareMixer>,
    loopback: Sender<AudioCommand>,
    pending: HashMap<u64, PendingTrack>,
    active: HashMap<u64, ActiveTrack>,
}

impl AudioThread {
    fn new(handle: OutputStreamHandle, mixer: Arc<SoftwareMixer>, loopback: Sender<AudioCommand>) -> Self {
        Self {
            handle,
            mixer,
            loopback,
            pending: HashMap::new(),
            active: HashMap::new(),
        }
    }

    fn run(mut self, receiver: mpsc::Receiver<AudioCommand>) {
        loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.poll_sinks();
        }
        debug!("Audio thread exiting");
    }

    fn handle_command(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Prepare {
                player,
                stream,
                track,
                looping,
                events,
            } => {
                self.release(player);
                let generation = events.generation();
                self.pending.insert(
                    player,
                    PendingTrack {
                        generation,
                        looping,
                        events,
                        stream,
                    },
                );
                let loopback = self.loopback.clone();
                thread::spawn(move || {
                    let media = load_media(&track);
                    let _ = loopback.send(AudioCommand::Loaded {
                        player,
                        generation,
                        media,
                    });
                });
            }
            AudioCommand::Loaded {
                player,
                generation,
                media,
            } => {
                let Some(pending) = self.pending.remove(&player) else {
                    return;
                };
                if pending.generation != generation {
                    self.pending.insert(player, pending);
                    return;
                }
                match media.and_then(|media| self.build_sink(media, pending.looping)) {
                    Ok(sink) => {
                        sink.set_volume(self.mixer.gain(pending.stream));
                        pending.events.prepared();
                        self.active.insert(
                            player,
                            ActiveTrack {
                                sink,
                                looping: pending.looping,
                                started: false,
                                events: pending.events,
                                stream: pending.stream,
                            },
                        );
                    }
                    Err(e) => {
                        warn!(player, error = %e, "Track failed to load");
                        pending.events.failed(e);
                    }
                }
            }
            AudioCommand::Start { player } => match self.active.get_mut(&player) {
                Some(track) => {
                    track.sink.play();
                    track.started = true;
                }
                None => warn!(player, "Start requested before the track was prepared"),
            },
            AudioCommand::Stop { player } => self.release(player),
        }
    }

    fn build_sink(&self, media: Media, looping: bool) -> PlayerResult<Sink> {
        let sink = Sink::try_new(&self.handle).map_err(|e| PlayerError::Output(e.to_string()))?;
        sink.pause();
        if looping {
            sink.append(media.repeat_infinite());
        } else {
            sink.append(media);
        }
        Ok(sink)
    }

    fn poll_sinks(&mut self) {
        let mut finished = Vec::new();
        for (player, track) in &self.active {
            track.sink.set_volume(self.mixer.gain(track.stream));
            if track.started && !track.looping && track.sink.empty() {
                finished.push(*player);
            }
        }
        for player in finished {
            if let Some(track) = self.active.remove(&player) {
                debug!(player, "Track completed");
                track.events.completed();
            }
        }
    }

    fn release(&mut self, player: u64) {
        self.pending.remove(&player);
        if let Some(track) = self.active.remove(&player) {
            track.sink.stop();
            debug!(player, "Track released");
        }
    }
}

fn load_media(track: &Track) -> PlayerResult<Media> {
    if let Some(name) = track.builtin_name() {
        let samples = builtin_tone(name)?;
        return Ok(Box::new(SamplesSource::new(samples, SAMPLE_RATE)));
    }
    if track.is_remote() {
        return decode(RemoteStream::open(&track.uri)?);
    }
    if track.uri.contains("://") {
        return Err(PlayerError::Unsupported(track.uri.clone()));
    }
    let file = File::open(&track.uri).map_err(|e| PlayerError::Open(format!("{}: {}", track.uri, e)))?;
    decode(BufReader::new(file))
}

fn decode<R>(reader: R) -> PlayerResult<Media>
where
    R: Read + Seek + Send + Sync + 'static,
{
    let decoder = Decoder::new(reader).map_err(|e| PlayerError::Decode(e.to_string()))?;
    Ok(Box::new(decoder.convert_samples::<f32>()))
}

/// Synthesize a bundled sound
fn builtin_tone(name: &str) -> PlayerResult<Vec<f32>> {
    // (frequency, beep ms, gap ms, beeps)
    let (frequency, beep_ms, gap_ms, beeps) = match name {
        "fallback" | "alarm" => (880.0, 400, 200, 3),
        "in-call" => (660.0, 150, 850, 1),
        "chime" => (523.25, 200, 300, 2),
        "beep" => (440.0, 100, 400, 1),
        other => return Err(PlayerError::Unsupported(format!("builtin:{other}"))),
    };

    let mut samples = Vec::new();
    for _ in 0..beeps {
        samples.extend(beep(frequency, Duration::from_millis(beep_ms)));
        samples.extend(std::iter::repeat(0.0).take(samples_for(Duration::from_millis(gap_ms))));
    }
    Ok(samples)
}

fn samples_for(duration: Duration) -> usize {
    (SAMPLE_RATE as u64 * duration.as_millis() as u64 / 1000) as usize
}

fn beep(frequency: f32, duration: Duration) -> impl Iterator<Item = f32> {
    let total = duration.as_secs_f32();
    (0..samples_for(duration)).map(move |i| {
        let t = i as f32 / SAMPLE_RATE as f32;
        // Short attack and release to avoid clicks
        let envelope = if t < 0.01 {
            t / 0.01
        } else if t > total - 0.05 {
            ((total - t) / 0.05).max(0.0)
        } else {
            1.0
        };
        (t * frequency * 2.0 * std::f32::consts::PI).sin() * envelope * 0.8
    })
}

/// Samples-based source for synthesized tones
struct SamplesSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
}

impl SamplesSource {
    fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }
}

impl Iterator for SamplesSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }
}

impl Source for SamplesSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len() - self.position)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let remaining = self.samples.len() - self.position;
        Some(Duration::from_secs_f32(remaining as f32 / self.sample_rate as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tones() {
        let fallback = builtin_tone("fallback").unwrap();
        assert_eq!(fallback.len(), samples_for(Duration::from_millis(1800)));
        assert!(fallback.iter().all(|s| s.abs() <= 1.0));
        assert!(builtin_tone("in-call").is_ok());
        assert!(matches!(
            builtin_tone("kazoo"),
            Err(PlayerError::Unsupported(_))
        ));
    }

    #[test]
    fn test_load_media_errors() {
        let missing = Track::new("/definitely/not/here.mp3", 0);
        assert!(matches!(load_media(&missing), Err(PlayerError::Open(_))));

        let plugin = Track::new("plugin://other/track", 0);
        assert!(matches!(load_media(&plugin), Err(PlayerError::Unsupported(_))));

        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("noise.mp3");
        std::fs::write(&garbage, b"definitely not audio").unwrap();
        let garbage = Track::new(garbage.display().to_string(), 0);
        assert!(matches!(load_media(&garbage), Err(PlayerError::Decode(_))));

        let tone = load_media(&Track::fallback()).unwrap();
        assert_eq!(tone.sample_rate(), SAMPLE_RATE);
    }

    #[test]
    fn test_samples_source() {
        let source = SamplesSource::new(vec![0.1, 0.2], SAMPLE_RATE);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.collect::<Vec<_>>(), vec![0.1, 0.2]);
    }
}

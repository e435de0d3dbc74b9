//! Progressive reader for remote tracks
//!
//! Internet radio never ends, so a remote track cannot be fetched in full
//! before it plays. [`RemoteStream`] hands the decoder bytes as they arrive
//! from a pump thread. Decoders detect a format by reading a header and
//! seeking back to the start, so the first stretch of the stream and a
//! window behind the read position stay buffered; anything older is
//! dropped.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{PlayerError, PlayerResult};

/// Bytes kept behind the read position for decoder seeks
const SEEK_WINDOW: u64 = 256 * 1024;

const CHUNK_SIZE: usize = 16 * 1024;

/// Chunks the pump may run ahead of playback
const QUEUED_CHUNKS: usize = 64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A read waiting this long for the next chunk fails
const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Seekable view over a remote body that is still downloading
pub struct RemoteStream {
    // Mutex only to make the reader Sync for the decoder
    chunks: Mutex<Receiver<io::Result<Vec<u8>>>>,
    buffer: Vec<u8>,
    /// Stream offset of `buffer[0]`
    offset: u64,
    position: u64,
    finished: bool,
    stall_timeout: Duration,
}

impl RemoteStream {
    /// Connect to `url` and start pumping its body.
    ///
    /// Only connecting is bounded in time; the body may run forever.
    pub fn open(url: &str) -> PlayerResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| PlayerError::Open(e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| PlayerError::Open(format!("{url}: {e}")))?;
        if !response.status().is_success() {
            return Err(PlayerError::Open(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let (tx, rx) = mpsc::sync_channel(QUEUED_CHUNKS);
        let name = url.to_string();
        thread::Builder::new()
            .name("alarm-audio-stream".to_string())
            .spawn(move || pump(response, tx, &name))
            .map_err(|e| PlayerError::Open(e.to_string()))?;

        info!(url = %url, "Remote stream opened");
        Ok(Self::from_chunks(rx))
    }

    /// Reader over chunks delivered by some other producer
    pub fn from_chunks(chunks: Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            chunks: Mutex::new(chunks),
            buffer: Vec::new(),
            offset: 0,
            position: 0,
            finished: false,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Override how long a read waits for data
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    fn buffered_end(&self) -> u64 {
        self.offset + self.buffer.len() as u64
    }

    fn fill(&mut self) -> io::Result<()> {
        let next = self
            .chunks
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .recv_timeout(self.stall_timeout);
        match next {
            Ok(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
            Ok(Err(e)) => {
                self.finished = true;
                return Err(e);
            }
            Err(RecvTimeoutError::Disconnected) => self.finished = true,
            Err(RecvTimeoutError::Timeout) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "remote stream stalled",
                ))
            }
        }
        Ok(())
    }

    fn trim(&mut self) {
        let behind = self.position.saturating_sub(self.offset);
        if behind > 2 * SEEK_WINDOW {
            let drop = ((behind - SEEK_WINDOW) as usize).min(self.buffer.len());
            self.buffer.drain(..drop);
            self.offset += drop as u64;
        }
    }
}

impl Read for RemoteStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.buffered_end() <= self.position {
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }

        let start = (self.position - self.offset) as usize;
        let count = out.len().min(self.buffer.len() - start);
        out[..count].copy_from_slice(&self.buffer[start..start + count]);
        self.position += count as u64;
        self.trim();
        Ok(count)
    }
}

impl Seek for RemoteStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "remote stream length is unknown",
                ))
            }
        };
        let target = target
            .filter(|&target| target >= self.offset)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "seek behind the buffered window",
                )
            })?;
        self.position = target;
        Ok(target)
    }
}

/// Copy `body` into `chunks` until it ends or the reader goes away
fn pump(mut body: impl Read, chunks: SyncSender<io::Result<Vec<u8>>>, url: &str) {
    loop {
        let mut chunk = vec![0; CHUNK_SIZE];
        match body.read(&mut chunk) {
            Ok(0) => {
                debug!(url = %url, "Remote stream ended");
                return;
            }
            Ok(n) => {
                chunk.truncate(n);
                if chunks.send(Ok(chunk)).is_err() {
                    debug!(url = %url, "Remote stream no longer read");
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(url = %url, error = %e, "Remote stream failed");
                let _ = chunks.send(Err(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_of(parts: &[&[u8]]) -> RemoteStream {
        let (tx, rx) = mpsc::sync_channel(parts.len().max(1));
        for part in parts {
            tx.send(Ok(part.to_vec())).unwrap();
        }
        RemoteStream::from_chunks(rx)
    }

    #[test]
    fn test_reads_across_chunks_until_the_end() {
        let mut stream = stream_of(&[b"hello ", b"", b"world"]);
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(stream.read(&mut [0; 4]).unwrap(), 0);
    }

    #[test]
    fn test_header_rewind() {
        let mut stream = stream_of(&[b"RIFF", b"....WAVE"]);
        let mut header = [0; 4];
        stream.read_exact(&mut header).unwrap();
        assert_eq!(&header, b"RIFF");
        assert_eq!(stream.stream_position().unwrap(), 4);

        assert_eq!(stream.seek(SeekFrom::Start(0)).unwrap(), 0);
        let mut again = [0; 12];
        stream.read_exact(&mut again).unwrap();
        assert_eq!(&again, b"RIFF....WAVE");

        assert_eq!(stream.seek(SeekFrom::Current(-4)).unwrap(), 8);
        assert!(stream.seek(SeekFrom::Current(-20)).is_err());
        let end = stream.seek(SeekFrom::End(0)).unwrap_err();
        assert_eq!(end.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_seek_ahead_waits_for_data() {
        let mut stream = stream_of(&[b"0123", b"4567", b"89"]);
        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"6789");
    }

    #[test]
    fn test_old_bytes_are_dropped() {
        let chunk = vec![7u8; CHUNK_SIZE];
        let total = 4 * SEEK_WINDOW as usize / CHUNK_SIZE;
        let parts: Vec<&[u8]> = (0..total).map(|_| chunk.as_slice()).collect();
        let mut stream = stream_of(&parts);

        let mut sink = Vec::new();
        stream.read_to_end(&mut sink).unwrap();
        assert_eq!(sink.len(), total * CHUNK_SIZE);
        assert!(stream.buffer.len() as u64 <= 2 * SEEK_WINDOW);
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
        assert!(stream.seek(SeekFrom::Current(-1024)).is_ok());
    }

    #[test]
    fn test_stall_and_failure_surface_as_errors() {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut stalled = RemoteStream::from_chunks(rx).with_stall_timeout(Duration::from_millis(10));
        let err = stalled.read(&mut [0; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        tx.send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            .unwrap();
        let err = stalled.read(&mut [0; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(stalled.read(&mut [0; 8]).unwrap(), 0);
    }

    #[test]
    fn test_pump_feeds_reader() {
        let body: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let (tx, rx) = mpsc::sync_channel(QUEUED_CHUNKS);
        pump(Cursor::new(body.clone()), tx, "http://radio.example/test");

        let mut stream = RemoteStream::from_chunks(rx);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }
}

//! Blocking MP3 playback through `rodio`.
//!
//! Each call opens a fresh output stream and tears it down afterwards, so a
//! device left in a bad state by one reply cannot wedge the next.  Call from
//! a blocking thread (`tokio::task::spawn_blocking`).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::output::SynthesisError;

/// Pause before opening the device, letting a previous stream release it.
const SETTLE_DELAY: Duration = Duration::from_millis(150);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Output stream and sink for one playback.  Dropping it stops the sink
/// before the stream goes away.
struct PlaybackDevice {
    sink: Sink,
    _stream: OutputStream,
    _handle: OutputStreamHandle,
}

impl PlaybackDevice {
    fn open(volume: f32) -> Result<Self, SynthesisError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| SynthesisError::Unavailable(format!("no output device: {e}")))?;
        let sink = Sink::try_new(&handle).map_err(|e| SynthesisError::Playback(e.to_string()))?;
        sink.set_volume(volume.clamp(0.0, 1.0));
        Ok(Self {
            sink,
            _stream: stream,
            _handle: handle,
        })
    }
}

impl Drop for PlaybackDevice {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Play the audio file at `path`, returning when it has finished or after
/// `timeout`, whichever comes first.  Hitting the timeout stops playback and
/// still counts as success.
pub fn play_file(path: &Path, timeout: Duration, volume: f32) -> Result<(), SynthesisError> {
    thread::sleep(SETTLE_DELAY);

    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| SynthesisError::Playback(format!("cannot decode audio: {e}")))?;

    let device = PlaybackDevice::open(volume)?;
    device.sink.append(source);

    let started = Instant::now();
    while !device.sink.empty() {
        if started.elapsed() >= timeout {
            log::warn!("playback: stopped after {:.0}s timeout", timeout.as_secs_f32());
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_is_io_error() {
        let err = play_file(
            Path::new("/definitely/not/here.mp3"),
            Duration::from_secs(1),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, SynthesisError::Io(_)));
    }

    #[test]
    fn undecodable_file_is_playback_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not audio").unwrap();
        let err = play_file(file.path(), Duration::from_secs(1), 1.0).unwrap_err();
        assert!(matches!(err, SynthesisError::Playback(_)));
    }
}

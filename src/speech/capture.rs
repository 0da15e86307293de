//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.
//! [`AudioCapture::start`] streams [`AudioChunk`]s over an mpsc channel; the
//! returned [`StreamHandle`] is a RAII guard and dropping it stops the
//! hardware stream.  [`record_phrase`] drives a [`PhraseDetector`] from a
//! live stream and is meant to run on a blocking thread.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::phrase::{AudioClip, PhraseDetector, PhraseSettings, Progress};
use super::resample::{downmix, StreamResampler, RECOGNIZER_RATE};

// ---------------------------------------------------------------------------
// AudioChunk / StreamHandle
// ---------------------------------------------------------------------------

/// One buffer from the cpal callback: interleaved `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    /// Mono samples at the device rate.
    pub fn mono(&self) -> Vec<f32> {
        downmix(&self.samples, self.channels)
    }
}

/// Keeps the cpal stream alive; dropping it stops capture.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("no input device with index {0} (see --list-mics)")]
    NoSuchIndex(usize),

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio stream stopped delivering data")]
    Stalled,
}

// ---------------------------------------------------------------------------
// Device listing
// ---------------------------------------------------------------------------

/// `(index, name)` of every input device on the default host.  The index is
/// what `--mic-index` / `speech.mic_index` expect.
pub fn list_input_devices() -> Result<Vec<(usize, String)>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()?
        .enumerate()
        .map(|(i, d)| (i, d.name().unwrap_or_else(|_| "<unnamed>".to_string())))
        .collect();
    Ok(devices)
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    format: cpal::SampleFormat,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open input device `index` (as listed by [`list_input_devices`]), or
    /// the host default when `None`.
    pub fn open(index: Option<usize>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = match index {
            Some(i) => host
                .input_devices()?
                .nth(i)
                .ok_or(DeviceError::NoSuchIndex(i))?,
            None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let format = supported.sample_format();
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::debug!(
            "capture: {} @ {sample_rate} Hz, {channels} ch, {format:?}",
            device.name().unwrap_or_default()
        );

        Ok(Self {
            device,
            config,
            format,
            sample_rate,
            channels,
        })
    }

    /// Start recording; every hardware buffer is sent to `tx` as `f32`.
    /// Send errors (receiver gone) are ignored so the audio thread never
    /// panics.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, DeviceError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let emit = move |samples: Vec<f32>| {
            let _ = tx.send(AudioChunk {
                samples,
                sample_rate,
                channels,
            });
        };
        let on_error = |err: cpal::StreamError| log::error!("capture: cpal stream error: {err}");

        let stream = match self.format {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| emit(data.to_vec()),
                on_error,
                None,
            )?,
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    emit(data.iter().map(|s| *s as f32 / 32_768.0).collect())
                },
                on_error,
                None,
            )?,
            cpal::SampleFormat::U16 => self.device.build_input_stream(
                &self.config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    emit(data.iter().map(|s| (*s as f32 - 32_768.0) / 32_768.0).collect())
                },
                on_error,
                None,
            )?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// record_phrase
// ---------------------------------------------------------------------------

/// Outcome of a blocking capture.
#[derive(Debug)]
pub enum Recording {
    Phrase(AudioClip),
    /// No speech began within the timeout.
    NoSpeech,
}

/// Open the device, calibrate, and block until one phrase is captured or
/// the wait times out.
pub fn record_phrase(
    device_index: Option<usize>,
    settings: PhraseSettings,
) -> Result<Recording, DeviceError> {
    let capture = AudioCapture::open(device_index)?;
    let (tx, rx) = mpsc::channel::<AudioChunk>();
    let _handle = capture.start(tx)?;

    let mut resampler = StreamResampler::new(capture.sample_rate(), RECOGNIZER_RATE);
    let mut detector = PhraseDetector::new(settings);
    // Wall-clock guard in case the device delivers less audio than expected.
    let deadline = Instant::now()
        + settings.calibration
        + settings.timeout
        + settings.phrase_limit
        + Duration::from_secs(1);

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match rx.recv_timeout(remaining.min(Duration::from_millis(500))) {
            Ok(chunk) => match detector.push(&resampler.push(&chunk.mono())) {
                Progress::Continue => {}
                Progress::Complete => return Ok(Recording::Phrase(detector.into_clip())),
                Progress::TimedOut => return Ok(Recording::NoSpeech),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return Err(DeviceError::Stalled),
        }
    }

    match detector.finish() {
        Progress::Complete => Ok(Recording::Phrase(detector.into_clip())),
        _ => Ok(Recording::NoSpeech),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn stereo_48k_chunks_become_16k_mono() {
        let chunk = AudioChunk {
            samples: vec![0.25; 960],
            sample_rate: 48_000,
            channels: 2,
        };
        let mut resampler = StreamResampler::new(chunk.sample_rate, RECOGNIZER_RATE);
        let total: usize = (0..10).map(|_| resampler.push(&chunk.mono()).len()).sum();
        assert_eq!(total.abs_diff(1_600), 0);
    }

    #[test]
    fn device_errors_render() {
        assert!(DeviceError::NoSuchIndex(7).to_string().contains('7'));
    }
}

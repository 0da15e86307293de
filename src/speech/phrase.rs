//! Energy-based phrase detection on 16 kHz mono audio.
//!
//! [`PhraseDetector`] consumes resampled audio and decides when one spoken
//! phrase has been captured:
//!
//! ```text
//! Calibrating ──(calibration elapsed)──▶ Waiting ──(voice frame)──▶ Recording
//!                                          │                          │
//!                                   (timeout elapsed)     (pause of silence or
//!                                          ▼                phrase limit)
//!                                      TimedOut                       ▼
//!                                                                 Complete
//! ```
//!
//! Audio is judged in 30 ms frames (480 samples).  During calibration the
//! ambient RMS is averaged and the speech threshold becomes
//! `max(energy_threshold, ambient × 1.5)`.  A short pre-roll of frames seen
//! while waiting is kept so the first syllable is not clipped.

use std::collections::VecDeque;
use std::time::Duration;

use super::resample::{rms, to_l16_le, RECOGNIZER_RATE};

/// 30 ms at 16 kHz.
pub const FRAME_SAMPLES: usize = 480;

/// Ambient level multiplier applied after calibration.
const AMBIENT_FACTOR: f32 = 1.5;

/// Frames kept from before speech onset (300 ms).
const PREROLL_FRAMES: usize = 10;

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// One captured phrase: 16 kHz mono samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        RECOGNIZER_RATE
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / RECOGNIZER_RATE as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Body for an `audio/l16; rate=16000` upload.
    pub fn to_l16(&self) -> Vec<u8> {
        to_l16_le(&self.samples)
    }
}

// ---------------------------------------------------------------------------
// PhraseSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseSettings {
    /// Minimum RMS treated as speech.
    pub energy_threshold: f32,
    /// Ambient sampling before listening starts.
    pub calibration: Duration,
    /// How long to wait for speech to begin.
    pub timeout: Duration,
    /// Maximum length of one phrase.
    pub phrase_limit: Duration,
    /// Silence that ends a phrase.
    pub pause: Duration,
}

impl Default for PhraseSettings {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            calibration: Duration::from_millis(600),
            timeout: Duration::from_secs(8),
            phrase_limit: Duration::from_secs(15),
            pause: Duration::from_millis(800),
        }
    }
}

fn frames_for(duration: Duration) -> usize {
    let samples = duration.as_micros() * u128::from(RECOGNIZER_RATE) / 1_000_000;
    samples.div_ceil(FRAME_SAMPLES as u128) as usize
}

// ---------------------------------------------------------------------------
// PhraseDetector
// ---------------------------------------------------------------------------

/// Result of feeding audio to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Keep feeding audio.
    Continue,
    /// A phrase has been captured; call [`PhraseDetector::into_clip`].
    Complete,
    /// No speech started before the timeout.
    TimedOut,
}

#[derive(Debug)]
enum Phase {
    Calibrating { frames_left: usize, level_sum: f32, frames: usize },
    Waiting { frames_waited: usize },
    Recording { silent_frames: usize, frames: usize },
    Complete,
    TimedOut,
}

#[derive(Debug)]
pub struct PhraseDetector {
    settings: PhraseSettings,
    phase: Phase,
    threshold: f32,
    pending: Vec<f32>,
    preroll: VecDeque<Vec<f32>>,
    recorded: Vec<f32>,
    timeout_frames: usize,
    limit_frames: usize,
    pause_frames: usize,
}

impl PhraseDetector {
    pub fn new(settings: PhraseSettings) -> Self {
        let calibration_frames = frames_for(settings.calibration);
        let phase = if calibration_frames == 0 {
            Phase::Waiting { frames_waited: 0 }
        } else {
            Phase::Calibrating {
                frames_left: calibration_frames,
                level_sum: 0.0,
                frames: 0,
            }
        };
        Self {
            settings,
            phase,
            threshold: settings.energy_threshold,
            pending: Vec::with_capacity(FRAME_SAMPLES * 2),
            preroll: VecDeque::with_capacity(PREROLL_FRAMES + 1),
            recorded: Vec::new(),
            timeout_frames: frames_for(settings.timeout).max(1),
            limit_frames: frames_for(settings.phrase_limit).max(1),
            pause_frames: frames_for(settings.pause).max(1),
        }
    }

    /// Speech threshold in effect (changes once calibration ends).
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.phase, Phase::Recording { .. })
    }

    /// Feed 16 kHz mono samples.  Audio after a terminal result is ignored.
    pub fn push(&mut self, samples: &[f32]) -> Progress {
        self.pending.extend_from_slice(samples);
        let mut start = 0;
        while self.pending.len() - start >= FRAME_SAMPLES {
            let frame = self.pending[start..start + FRAME_SAMPLES].to_vec();
            start += FRAME_SAMPLES;
            let progress = self.on_frame(frame);
            if progress != Progress::Continue {
                self.pending.clear();
                return progress;
            }
        }
        self.pending.drain(..start);
        Progress::Continue
    }

    /// Declare the input exhausted.  A phrase in progress is completed;
    /// otherwise the capture timed out.
    pub fn finish(&mut self) -> Progress {
        match self.phase {
            Phase::Recording { .. } | Phase::Complete => {
                self.phase = Phase::Complete;
                Progress::Complete
            }
            _ => {
                self.phase = Phase::TimedOut;
                Progress::TimedOut
            }
        }
    }

    /// The captured phrase (empty unless [`Progress::Complete`] was seen).
    pub fn into_clip(self) -> AudioClip {
        AudioClip::new(self.recorded)
    }

    fn on_frame(&mut self, frame: Vec<f32>) -> Progress {
        let level = rms(&frame);
        match &mut self.phase {
            Phase::Calibrating { frames_left, level_sum, frames } => {
                *level_sum += level;
                *frames += 1;
                *frames_left -= 1;
                if *frames_left == 0 {
                    let ambient = *level_sum / *frames as f32;
                    self.threshold = self.settings.energy_threshold.max(ambient * AMBIENT_FACTOR);
                    log::debug!(
                        "phrase: ambient rms {ambient:.4}, threshold {:.4}",
                        self.threshold
                    );
                    self.phase = Phase::Waiting { frames_waited: 0 };
                }
                Progress::Continue
            }
            Phase::Waiting { frames_waited } => {
                if level > self.threshold {
                    for earlier in self.preroll.drain(..) {
                        self.recorded.extend_from_slice(&earlier);
                    }
                    self.recorded.extend_from_slice(&frame);
                    self.phase = Phase::Recording { silent_frames: 0, frames: 1 };
                    return self.check_limit();
                }
                *frames_waited += 1;
                if *frames_waited >= self.timeout_frames {
                    self.phase = Phase::TimedOut;
                    return Progress::TimedOut;
                }
                self.preroll.push_back(frame);
                if self.preroll.len() > PREROLL_FRAMES {
                    self.preroll.pop_front();
                }
                Progress::Continue
            }
            Phase::Recording { silent_frames, frames } => {
                self.recorded.extend_from_slice(&frame);
                *frames += 1;
                if level > self.threshold {
                    *silent_frames = 0;
                } else {
                    *silent_frames += 1;
                    if *silent_frames >= self.pause_frames {
                        self.phase = Phase::Complete;
                        return Progress::Complete;
                    }
                }
                self.check_limit()
            }
            Phase::Complete => Progress::Complete,
            Phase::TimedOut => Progress::TimedOut,
        }
    }

    fn check_limit(&mut self) -> Progress {
        if let Phase::Recording { frames, .. } = self.phase {
            if frames >= self.limit_frames {
                self.phase = Phase::Complete;
                return Progress::Complete;
            }
        }
        Progress::Continue
    }
}

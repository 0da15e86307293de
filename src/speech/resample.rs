//! Sample conversion between the microphone and the recognizer.
//!
//! The recognition endpoint takes **16 kHz mono signed 16-bit little-endian**
//! PCM (`audio/l16; rate=16000`).  Device audio is converted in three steps:
//!
//! 1. [`downmix`] interleaved channels to mono.
//! 2. [`resample`] (or [`StreamResampler`] for live buffers) to
//!    [`RECOGNIZER_RATE`] with linear interpolation.
//! 3. [`to_l16_le`] quantise to 16-bit PCM bytes.

/// Sample rate expected by the recognizer, in Hz.
pub const RECOGNIZER_RATE: u32 = 16_000;

/// Average interleaved channels into one.  `channels == 0` yields nothing.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample a whole signal from `from_rate` to `to_rate` in one piece.
///
/// ```rust
/// use translator_mini::speech::resample::resample;
///
/// let lo = resample(&vec![0.25_f32; 480], 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    StreamResampler::new(from_rate, to_rate).push(samples)
}

/// Linear-interpolation resampler fed one device buffer at a time.
///
/// The read position and the last input sample carry over between
/// [`push`](Self::push) calls, so splitting a signal into buffers of any
/// size yields the same output as resampling it in one piece.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    step: f64,
    /// Position of the next output sample, relative to `prev` when set.
    pos: f64,
    prev: Option<f32>,
    passthrough: bool,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let passthrough = from_rate == to_rate || from_rate == 0 || to_rate == 0;
        Self {
            step: if passthrough { 1.0 } else { from_rate as f64 / to_rate as f64 },
            pos: 0.0,
            prev: None,
            passthrough,
        }
    }

    /// Resample the next buffer of mono samples.
    pub fn push(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.passthrough {
            return samples.to_vec();
        }
        if samples.is_empty() {
            return Vec::new();
        }

        let buf: Vec<f32> = self.prev.into_iter().chain(samples.iter().copied()).collect();
        let mut out = Vec::with_capacity((samples.len() as f64 / self.step) as usize + 1);
        loop {
            let idx = self.pos as usize;
            if idx + 1 >= buf.len() {
                break;
            }
            let frac = (self.pos - idx as f64) as f32;
            out.push(buf[idx] * (1.0 - frac) + buf[idx + 1] * frac);
            self.pos += self.step;
        }

        // Re-anchor on the last sample, which becomes `prev`.
        self.pos -= (buf.len() - 1) as f64;
        self.prev = buf.last().copied();
        out
    }
}

/// Root-mean-square level of a block of samples (0.0 for an empty block).
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Quantise `[-1.0, 1.0]` samples to signed 16-bit little-endian bytes.
/// Out-of-range input is clamped.
pub fn to_l16_le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let out = downmix(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
        assert!(downmix(&[0.1, 0.2], 0).is_empty());
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn same_rate_is_unchanged() {
        let input = vec![0.1_f32, -0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn common_device_rates_reach_one_second() {
        for rate in [44_100_u32, 48_000, 22_050] {
            let out = resample(&vec![0.0; rate as usize], rate, RECOGNIZER_RATE);
            assert!(
                out.len().abs_diff(16_000) <= 1,
                "{rate} Hz gave {} samples",
                out.len()
            );
        }
    }

    #[test]
    fn upsampling_interpolates() {
        let out = resample(&[0.0, 1.0, 0.0], 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stream_resampler_matches_whole_signal_across_buffers() {
        let signal: Vec<f32> = (0..4_410).map(|i| (i as f32 * 0.013).sin()).collect();
        let mut whole = StreamResampler::new(44_100, RECOGNIZER_RATE);
        let expected = whole.push(&signal);

        // Odd buffer sizes so boundaries fall at every fractional offset.
        let mut chunked = StreamResampler::new(44_100, RECOGNIZER_RATE);
        let mut got = Vec::new();
        for buffer in signal.chunks(441).flat_map(|c| c.chunks(97)) {
            got.extend(chunked.push(buffer));
        }

        assert_eq!(got.len(), expected.len());
        assert!(got.iter().zip(&expected).all(|(a, b)| (a - b).abs() < 1e-5));
        assert!(got.len().abs_diff(1_600) <= 1, "got {} samples", got.len());
    }

    #[test]
    fn stream_resampler_adds_no_samples_per_buffer() {
        let mut resampler = StreamResampler::new(48_000, RECOGNIZER_RATE);
        let total: usize = (0..100).map(|_| resampler.push(&[0.25; 441]).len()).sum();
        assert!(total.abs_diff(44_100 / 3) <= 1, "got {total}");
    }

    #[test]
    fn stream_resampler_passes_matching_rates_through() {
        let mut resampler = StreamResampler::new(16_000, 16_000);
        assert_eq!(resampler.push(&[0.1, 0.2]), vec![0.1, 0.2]);
    }

    #[test]
    fn rms_of_constant_signal() {
        assert!((rms(&[0.5; 100]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn l16_is_little_endian_and_clamped() {
        let bytes = to_l16_le(&[0.0, 1.0, -2.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[0..2], &[0, 0]);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), -i16::MAX);
    }
}

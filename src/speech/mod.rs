//! Speech input and output.
//!
//! # Input
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix + resample to 16 kHz
//!           → PhraseDetector → AudioClip → Recognizer (primary, then secondary locale)
//! ```
//!
//! # Output
//!
//! ```text
//! text → FallbackSpeaker → GoogleTtsEngine (MP3 → rodio) ─┐
//!                        └→ LocalEngine (espeak / say / SAPI) ◀┘ on failure
//! ```

pub mod capture;
pub mod input;
pub mod local;
pub mod output;
pub mod phrase;
pub mod playback;
pub mod recognize;
pub mod remote;
pub mod resample;

pub use capture::{list_input_devices, AudioCapture, AudioChunk, DeviceError, StreamHandle};
pub use input::{CaptureError, CaptureRequest, MicrophoneInput, SpeechInput, SpeechLanguage};
pub use local::LocalEngine;
pub use output::{FallbackSpeaker, SpeechOutput, SynthesisEngine, SynthesisError};
pub use phrase::{AudioClip, PhraseDetector, PhraseSettings};
pub use recognize::{GoogleSpeechRecognizer, Recognizer};
pub use remote::GoogleTtsEngine;

use std::sync::Arc;

use crate::config::{SpeechConfig, TtsConfig, TtsEngineChoice};

/// Microphone input wired to the configured recognition endpoint.
pub fn build_input(config: &SpeechConfig) -> MicrophoneInput {
    let recognizer = GoogleSpeechRecognizer::new(&config.recognizer_url, &config.recognizer_key);
    MicrophoneInput::new(config, Arc::new(recognizer))
}

/// Speaker for the configured engine choice.  The remote engine always has
/// the local engine behind it.  `rate` is the local speaking rate in words
/// per minute.
pub fn build_speaker(config: &TtsConfig, rate: u32) -> FallbackSpeaker {
    let local: Box<dyn SynthesisEngine> = Box::new(LocalEngine::new(rate, config.volume));
    let engines = match config.engine {
        TtsEngineChoice::Remote => vec![
            Box::new(GoogleTtsEngine::from_config(config)) as Box<dyn SynthesisEngine>,
            local,
        ],
        TtsEngineChoice::Local => vec![local],
    };
    FallbackSpeaker::new(engines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_choice_keeps_local_fallback() {
        let speaker = build_speaker(&TtsConfig::default(), 150);
        assert_eq!(speaker.engine_names(), vec!["google-tts", "local"]);
    }

    #[test]
    fn local_choice_has_single_engine() {
        let config = TtsConfig {
            engine: TtsEngineChoice::Local,
            ..TtsConfig::default()
        };
        assert_eq!(build_speaker(&config, 150).engine_names(), vec!["local"]);
    }
}

//! Speech input: microphone phrase → text.
//!
//! [`SpeechInput`] is the seam sessions talk to.  [`MicrophoneInput`] is the
//! real implementation: it records one phrase on a blocking thread, then
//! asks the [`Recognizer`] for a transcript.  With [`SpeechLanguage::Auto`]
//! the primary locale is tried first and, if it understands nothing, the
//! secondary locale is tried on the same audio.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::capture::{record_phrase, DeviceError, Recording};
use super::phrase::{AudioClip, PhraseSettings};
use super::recognize::{RecognizeError, Recognizer};
use crate::config::{LanguagePolicy, SpeechConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Recognition language for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechLanguage {
    /// Try the configured primary then secondary locale.
    Auto,
    /// A single BCP-47 locale such as `vi-VN`.
    Locale(String),
}

impl SpeechLanguage {
    /// Map a configured policy; fixed languages use their default locale.
    pub fn from_policy(policy: LanguagePolicy) -> Self {
        match policy.fixed() {
            Some(language) => SpeechLanguage::Locale(language.locale().to_string()),
            None => SpeechLanguage::Auto,
        }
    }
}

/// Parameters of one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub device_index: Option<usize>,
    pub language: SpeechLanguage,
    /// How long to wait for speech to start.
    pub timeout: Duration,
    /// Maximum phrase length.
    pub phrase_limit: Duration,
}

impl CaptureRequest {
    pub fn from_config(config: &SpeechConfig, language: SpeechLanguage) -> Self {
        Self {
            device_index: config.mic_index,
            language,
            timeout: Duration::from_secs_f32(config.listen_timeout_secs.max(0.0)),
            phrase_limit: Duration::from_secs_f32(config.phrase_limit_secs.max(0.0)),
        }
    }
}

/// Why a capture produced no text.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No speech started before the timeout.
    #[error("no speech detected")]
    Timeout,

    /// Speech was captured but no locale produced a transcript.
    #[error("could not understand the audio")]
    Unintelligible,

    #[error("microphone error: {0}")]
    Device(#[from] DeviceError),

    #[error("speech recognition failed: {0}")]
    Recognition(String),

    #[error("capture task failed: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Timeouts and unintelligible audio are ordinary outcomes of a turn;
    /// everything else is an environment problem.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::Timeout | CaptureError::Unintelligible)
    }
}

// ---------------------------------------------------------------------------
// SpeechInput trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Capture one phrase and return its transcript.
    async fn capture(&self, request: &CaptureRequest) -> Result<String, CaptureError>;
}

// ---------------------------------------------------------------------------
// MicrophoneInput
// ---------------------------------------------------------------------------

pub struct MicrophoneInput {
    recognizer: Arc<dyn Recognizer>,
    energy_threshold: f32,
    calibration: Duration,
    pause: Duration,
    primary_locale: String,
    secondary_locale: String,
}

impl MicrophoneInput {
    pub fn new(config: &SpeechConfig, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            energy_threshold: config.energy_threshold,
            calibration: Duration::from_secs_f32(config.calibration_secs.max(0.0)),
            pause: Duration::from_secs_f32(config.pause_secs.max(0.0)),
            primary_locale: config.primary_locale.clone(),
            secondary_locale: config.secondary_locale.clone(),
        }
    }

    fn phrase_settings(&self, request: &CaptureRequest) -> PhraseSettings {
        PhraseSettings {
            energy_threshold: self.energy_threshold,
            calibration: self.calibration,
            timeout: request.timeout,
            phrase_limit: request.phrase_limit,
            pause: self.pause,
        }
    }

    /// Locales to try, in order.
    fn locales<'a>(&'a self, language: &'a SpeechLanguage) -> Vec<&'a str> {
        match language {
            SpeechLanguage::Locale(locale) => vec![locale.as_str()],
            SpeechLanguage::Auto => vec![self.primary_locale.as_str(), self.secondary_locale.as_str()],
        }
    }

    /// Transcribe one captured clip, trying each locale in turn on the same
    /// audio.  The last transport error wins over `Unintelligible`.
    async fn recognize_clip(
        &self,
        clip: &AudioClip,
        language: &SpeechLanguage,
    ) -> Result<String, CaptureError> {
        let mut last_error = CaptureError::Unintelligible;
        for locale in self.locales(language) {
            match self.recognizer.recognize(clip, locale).await {
                Ok(text) => {
                    log::info!("input: recognised ({locale}): {text}");
                    return Ok(text);
                }
                Err(RecognizeError::NoMatch) => {
                    log::debug!("input: nothing recognised for {locale}");
                }
                Err(e) => {
                    log::warn!("input: recognition with {locale} failed: {e}");
                    last_error = CaptureError::Recognition(e.to_string());
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl SpeechInput for MicrophoneInput {
    async fn capture(&self, request: &CaptureRequest) -> Result<String, CaptureError> {
        let settings = self.phrase_settings(request);
        let device_index = request.device_index;

        let recording = tokio::task::spawn_blocking(move || record_phrase(device_index, settings))
            .await
            .map_err(|e| CaptureError::Internal(e.to_string()))??;

        let clip = match recording {
            Recording::Phrase(clip) => clip,
            Recording::NoSpeech => return Err(CaptureError::Timeout),
        };
        log::debug!("input: captured {:.1}s of speech", clip.duration().as_secs_f32());
        self.recognize_clip(&clip, &request.language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mic() -> MicrophoneInput {
        struct Never;

        #[async_trait]
        impl Recognizer for Never {
            async fn recognize(
                &self,
                _clip: &crate::speech::phrase::AudioClip,
                _locale: &str,
            ) -> Result<String, RecognizeError> {
                Err(RecognizeError::NoMatch)
            }
        }

        MicrophoneInput::new(&SpeechConfig::default(), Arc::new(Never))
    }

    #[test]
    fn auto_tries_primary_then_secondary() {
        let input = mic();
        assert_eq!(input.locales(&SpeechLanguage::Auto), vec!["vi-VN", "en-US"]);
        let fixed = SpeechLanguage::Locale("en-US".into());
        assert_eq!(input.locales(&fixed), vec!["en-US"]);
    }

    /// Answers per locale and records every (clip, locale) it was asked about.
    struct PerLocale {
        answers: Vec<(&'static str, Result<&'static str, RecognizeError>)>,
        seen: std::sync::Mutex<Vec<(AudioClip, String)>>,
    }

    #[async_trait]
    impl Recognizer for PerLocale {
        async fn recognize(&self, clip: &AudioClip, locale: &str) -> Result<String, RecognizeError> {
            self.seen.lock().unwrap().push((clip.clone(), locale.to_string()));
            match self.answers.iter().find(|(l, _)| *l == locale).map(|(_, a)| a) {
                Some(Ok(text)) => Ok(text.to_string()),
                Some(Err(RecognizeError::Status(code))) => Err(RecognizeError::Status(*code)),
                Some(Err(RecognizeError::Transport(e))) => Err(RecognizeError::Transport(e.clone())),
                _ => Err(RecognizeError::NoMatch),
            }
        }
    }

    fn mic_with(
        answers: Vec<(&'static str, Result<&'static str, RecognizeError>)>,
    ) -> (MicrophoneInput, Arc<PerLocale>) {
        let recognizer = Arc::new(PerLocale {
            answers,
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let input = MicrophoneInput::new(&SpeechConfig::default(), recognizer.clone());
        (input, recognizer)
    }

    fn clip() -> AudioClip {
        AudioClip::new(vec![0.1, -0.2, 0.3, -0.4])
    }

    #[tokio::test]
    async fn auto_falls_back_to_secondary_on_the_same_clip() {
        let (input, recognizer) = mic_with(vec![
            ("vi-VN", Err(RecognizeError::NoMatch)),
            ("en-US", Ok("hello there")),
        ]);

        let text = input.recognize_clip(&clip(), &SpeechLanguage::Auto).await.unwrap();
        assert_eq!(text, "hello there");

        let seen = recognizer.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (clip(), "vi-VN".to_string()));
        assert_eq!(seen[1], (clip(), "en-US".to_string()));
    }

    #[tokio::test]
    async fn fixed_locale_asks_once() {
        let (input, recognizer) = mic_with(vec![("en-US", Err(RecognizeError::NoMatch))]);
        let language = SpeechLanguage::Locale("en-US".into());

        let result = input.recognize_clip(&clip(), &language).await;
        assert!(matches!(result, Err(CaptureError::Unintelligible)));
        assert_eq!(recognizer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn both_locales_failing_reports_the_outcome() {
        let (input, _) = mic_with(vec![]);
        assert!(matches!(
            input.recognize_clip(&clip(), &SpeechLanguage::Auto).await,
            Err(CaptureError::Unintelligible)
        ));

        let (input, recognizer) = mic_with(vec![
            ("vi-VN", Err(RecognizeError::Status(503))),
            ("en-US", Err(RecognizeError::NoMatch)),
        ]);
        assert!(matches!(
            input.recognize_clip(&clip(), &SpeechLanguage::Auto).await,
            Err(CaptureError::Recognition(_))
        ));
        assert_eq!(recognizer.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn policy_maps_to_language() {
        assert_eq!(
            SpeechLanguage::from_policy(LanguagePolicy::Vi),
            SpeechLanguage::Locale("vi-VN".into())
        );
        assert_eq!(
            SpeechLanguage::from_policy(LanguagePolicy::Auto),
            SpeechLanguage::Auto
        );
    }

    #[test]
    fn request_from_config_uses_configured_limits() {
        let request = CaptureRequest::from_config(&SpeechConfig::default(), SpeechLanguage::Auto);
        assert_eq!(request.timeout, Duration::from_secs(8));
        assert_eq!(request.phrase_limit, Duration::from_secs(15));
        assert_eq!(request.device_index, None);
    }

    #[test]
    fn recoverable_errors() {
        assert!(CaptureError::Timeout.is_recoverable());
        assert!(CaptureError::Unintelligible.is_recoverable());
        assert!(!CaptureError::Device(DeviceError::NoDevice).is_recoverable());
    }
}

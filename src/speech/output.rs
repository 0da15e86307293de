//! Speech output: text → audible speech, with engine fallback.
//!
//! [`SpeechOutput`] is the seam sessions talk to.  It never fails loudly:
//! `synthesize` reports `false` and the caller carries on with the printed
//! text.  [`FallbackSpeaker`] tries its [`SynthesisEngine`]s in order and
//! stops at the first that succeeds, so a working remote voice is never
//! followed by the local one.

use async_trait::async_trait;
use thiserror::Error;

use crate::language::Language;

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The engine cannot run on this machine (no program, no device).
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external synthesis program ran but reported failure.
    #[error("synthesis program failed: {0}")]
    Program(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        SynthesisError::Network(e.to_string())
    }
}

/// One synthesis engine.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Speak `text` in `language`, returning once playback has finished.
    async fn speak(&self, text: &str, language: Language) -> Result<(), SynthesisError>;
}

#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`; `true` when some engine played it.  Empty text is a
    /// successful no-op.
    async fn synthesize(&self, text: &str, language: Language) -> bool;
}

// ---------------------------------------------------------------------------
// FallbackSpeaker
// ---------------------------------------------------------------------------

pub struct FallbackSpeaker {
    engines: Vec<Box<dyn SynthesisEngine>>,
}

impl FallbackSpeaker {
    /// Engines are tried in the given order.
    pub fn new(engines: Vec<Box<dyn SynthesisEngine>>) -> Self {
        Self { engines }
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl SpeechOutput for FallbackSpeaker {
    async fn synthesize(&self, text: &str, language: Language) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return true;
        }

        for (i, engine) in self.engines.iter().enumerate() {
            match engine.speak(text, language).await {
                Ok(()) => {
                    log::debug!("output: spoken with {} ({language})", engine.name());
                    return true;
                }
                Err(e) if i + 1 < self.engines.len() => {
                    log::warn!("output: {} failed ({e}), falling back", engine.name());
                }
                Err(e) => {
                    log::warn!("output: {} failed: {e}", engine.name());
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        ok: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SynthesisEngine for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn speak(&self, _text: &str, _language: Language) -> Result<(), SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(())
            } else {
                Err(SynthesisError::Network("offline".into()))
            }
        }
    }

    fn engine(name: &'static str, ok: bool) -> (Box<dyn SynthesisEngine>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Counting {
            name,
            ok,
            calls: calls.clone(),
        };
        (Box::new(engine), calls)
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_local_once() {
        let (remote, remote_calls) = engine("remote", false);
        let (local, local_calls) = engine("local", true);
        let speaker = FallbackSpeaker::new(vec![remote, local]);

        assert!(speaker.synthesize("Xin chào", Language::Vi).await);
        assert_eq!(remote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(local_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_success_stops_the_chain() {
        let (remote, _) = engine("remote", true);
        let (local, local_calls) = engine("local", true);
        let speaker = FallbackSpeaker::new(vec![remote, local]);

        assert!(speaker.synthesize("Hello", Language::En).await);
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_engines_failing_reports_false() {
        let (a, _) = engine("a", false);
        let (b, _) = engine("b", false);
        let speaker = FallbackSpeaker::new(vec![a, b]);
        assert!(!speaker.synthesize("Hello", Language::En).await);
    }

    #[tokio::test]
    async fn empty_text_is_a_silent_success() {
        let (a, calls) = engine("a", false);
        let speaker = FallbackSpeaker::new(vec![a]);
        assert!(speaker.synthesize("   ", Language::En).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn engine_order_is_kept() {
        let (a, _) = engine("remote", true);
        let (b, _) = engine("local", true);
        assert_eq!(FallbackSpeaker::new(vec![a, b]).engine_names(), vec!["remote", "local"]);
    }
}

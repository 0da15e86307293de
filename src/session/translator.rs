//! Translator session for the `voice` and `text` modes.
//!
//! Unlike [`ConversationSession`](super::ConversationSession) it keeps no
//! history: every input is translated on its own and, when voice output is
//! on, the translation is spoken in the target language.

use std::sync::Arc;
use std::time::Duration;

use crate::chat::{resolve_direction, ChatBackend, ChatError, Message};
use crate::config::TranslateDirection;
use crate::language::Language;
use crate::speech::{CaptureError, CaptureRequest, SpeechInput, SpeechOutput};

use super::interrupt::Interrupt;

/// One translated input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub source_text: String,
    pub translated: String,
    pub source: Language,
    pub target: Language,
}

impl Translation {
    /// Two-line rendering used on stdout (`EN: …` / `VI: …`).
    pub fn render(&self) -> String {
        format!(
            "{}: {}\n{}: {}",
            self.source.code().to_uppercase(),
            self.source_text,
            self.target.code().to_uppercase(),
            self.translated
        )
    }
}

pub struct TranslatorSession {
    backend: Arc<dyn ChatBackend>,
    direction: TranslateDirection,
    timeout: Duration,
    input: Option<Arc<dyn SpeechInput>>,
    output: Option<Arc<dyn SpeechOutput>>,
    capture: Option<CaptureRequest>,
    interrupt: Interrupt,
}

impl TranslatorSession {
    pub fn new(backend: Arc<dyn ChatBackend>, direction: TranslateDirection, timeout: Duration) -> Self {
        Self {
            backend,
            direction,
            timeout,
            input: None,
            output: None,
            capture: None,
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_input(mut self, input: Arc<dyn SpeechInput>, request: CaptureRequest) -> Self {
        self.input = Some(input);
        self.capture = Some(request);
        self
    }

    /// Speak every translation through `output`.
    pub fn with_output(mut self, output: Arc<dyn SpeechOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// `true` when translations are spoken.
    pub fn speaks(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_triggered()
    }

    /// Capture one phrase from the microphone.  `Ok(None)` when the session
    /// has no speech input or was interrupted while listening.
    pub async fn listen(&self) -> Result<Option<String>, CaptureError> {
        let (Some(input), Some(request)) = (&self.input, &self.capture) else {
            return Ok(None);
        };
        tokio::select! {
            result = input.capture(request) => result.map(Some),
            _ = self.interrupt.triggered() => Ok(None),
        }
    }

    /// Translate `text` under the configured direction.  `Ok(None)` when
    /// the session was interrupted before the backend answered.
    pub async fn translate(&self, text: &str) -> Result<Option<Translation>, ChatError> {
        let text = text.trim();
        let (source, target) = resolve_direction(self.direction, text);
        let request = [Message::user(text)];

        let translated = tokio::select! {
            r = tokio::time::timeout(self.timeout, self.backend.complete(&request)) => {
                r.map_err(|_| ChatError::Timeout)??.trim().to_string()
            }
            _ = self.interrupt.triggered() => return Ok(None),
        };
        log::debug!("translator: {} → {} via {}", source, target, self.backend.name());

        Ok(Some(Translation {
            source_text: text.to_string(),
            translated,
            source,
            target,
        }))
    }

    /// Speak a translation in its target language.  `false` without voice
    /// output or when every engine failed.
    pub async fn speak(&self, translation: &Translation) -> bool {
        let Some(output) = &self.output else {
            return false;
        };
        tokio::select! {
            ok = output.synthesize(&translation.translated, translation.target) => ok,
            _ = self.interrupt.triggered() => false,
        }
    }
}

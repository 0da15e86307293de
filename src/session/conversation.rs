//! Conversation session: one listen → think → speak turn at a time.
//!
//! [`ConversationSession`] owns the bounded [`History`] and sequences the
//! speech input, the chat backend and the speech output.  Turns never
//! overlap.  The user/assistant pair is committed in one synchronous step
//! after the backend result is fully available, so a failed, timed-out or
//! interrupted turn leaves the history exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::interrupt::Interrupt;
use super::persona::{Command, FAREWELL, GREETING};
use super::state::SessionState;
use crate::chat::{ChatBackend, ChatError, History};
use crate::config::LanguagePolicy;
use crate::language::{detect, Language};
use crate::speech::{CaptureError, CaptureRequest, SpeechInput, SpeechOutput};

// ---------------------------------------------------------------------------
// Configuration / results
// ---------------------------------------------------------------------------

/// Immutable settings fixed when the session is created.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub system_prompt: String,
    /// Non-system messages kept in history.
    pub max_history: usize,
    /// Upper bound for one backend call (including a whole stream).
    pub backend_timeout: Duration,
    /// Synthesis language; `Auto` detects it from each reply.
    pub output_language: LanguagePolicy,
    /// Initial state of voice output (text sessions can toggle it).
    pub speak_output: bool,
    /// Parameters for voice captures.
    pub capture: CaptureRequest,
}

/// Why a turn produced no reply.
#[derive(Debug, Error)]
pub enum TurnFailure {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Backend(#[from] ChatError),

    #[error("interrupted")]
    Interrupted,

    /// A voice turn was requested on a session built without speech input.
    #[error("no speech input configured")]
    NoSpeechInput,
}

/// What a turn amounted to.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The backend answered; the pair is in history.
    Answered,
    /// Nothing to process (empty line).
    NoInput,
    /// An exit phrase was recognised.
    Exited,
    Reset,
    VoiceOn,
    VoiceOff,
    Failed(TurnFailure),
}

/// Progress notifications for the user surface, delivered synchronously
/// while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Listening,
    Heard(String),
    Thinking,
    /// A non-streamed reply, committed and about to be spoken.
    Reply(String),
    Speaking(Language),
    /// Synthesis finished; `false` if every engine failed.
    Spoken(bool),
}

pub type EventSink = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Result of one loop iteration.
#[derive(Debug)]
pub struct TurnResult {
    pub continue_loop: bool,
    pub input: Option<String>,
    pub response: Option<String>,
    pub outcome: TurnOutcome,
}

impl TurnResult {
    fn new(continue_loop: bool, input: Option<String>, outcome: TurnOutcome) -> Self {
        Self {
            continue_loop,
            input,
            response: None,
            outcome,
        }
    }

    fn answered(input: String, response: String) -> Self {
        Self {
            continue_loop: true,
            input: Some(input),
            response: Some(response),
            outcome: TurnOutcome::Answered,
        }
    }

    fn failed(input: Option<String>, failure: TurnFailure) -> Self {
        // Only an interrupt ends the loop; every other failure is retried.
        let continue_loop = !matches!(failure, TurnFailure::Interrupted);
        Self::new(continue_loop, input, TurnOutcome::Failed(failure))
    }
}

// ---------------------------------------------------------------------------
// ConversationSession
// ---------------------------------------------------------------------------

pub struct ConversationSession {
    config: SessionConfig,
    history: History,
    backend: Arc<dyn ChatBackend>,
    input: Option<Arc<dyn SpeechInput>>,
    output: Option<Arc<dyn SpeechOutput>>,
    speak_output: bool,
    state: SessionState,
    interrupt: Interrupt,
    events: Option<EventSink>,
}

impl ConversationSession {
    pub fn new(config: SessionConfig, backend: Arc<dyn ChatBackend>) -> Self {
        let history = History::new(config.system_prompt.clone(), config.max_history);
        let speak_output = config.speak_output;
        Self {
            config,
            history,
            backend,
            input: None,
            output: None,
            speak_output,
            state: SessionState::Idle,
            interrupt: Interrupt::new(),
            events: None,
        }
    }

    pub fn with_input(mut self, input: Arc<dyn SpeechInput>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn SpeechOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sink) = &self.events {
            sink(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn speak_output(&self) -> bool {
        self.speak_output
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Clear history back to the system prompt.  Configuration is untouched.
    pub fn reset(&mut self) {
        self.history.reset();
        if !self.state.is_terminal() {
            self.state = SessionState::Idle;
        }
        log::info!("session: history reset");
    }

    pub fn set_speak_output(&mut self, enabled: bool) {
        self.speak_output = enabled;
    }

    pub fn stop(&mut self) {
        self.state = SessionState::Stopped;
    }

    /// Speak the assistant greeting (in Vietnamese) and return its text.
    pub async fn greet(&mut self) -> &'static str {
        self.speak_in(GREETING, Language::Vi).await;
        GREETING
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Voice turn: capture a phrase, then handle it like typed input (exit
    /// phrases only; typed commands are not recognised from speech).
    pub async fn process_turn(&mut self) -> TurnResult {
        if self.interrupt.is_triggered() {
            self.stop();
            return TurnResult::failed(None, TurnFailure::Interrupted);
        }
        let Some(input) = self.input.clone() else {
            return TurnResult::failed(None, TurnFailure::NoSpeechInput);
        };

        self.state = SessionState::Listening;
        self.emit(SessionEvent::Listening);
        let interrupt = self.interrupt.clone();
        let captured = tokio::select! {
            result = input.capture(&self.config.capture) => Some(result),
            _ = interrupt.triggered() => None,
        };

        match captured {
            None => {
                self.stop();
                TurnResult::failed(None, TurnFailure::Interrupted)
            }
            Some(Err(e)) => {
                log::info!("session: capture produced no text: {e}");
                self.state = SessionState::Idle;
                TurnResult::failed(None, e.into())
            }
            Some(Ok(text)) => {
                self.emit(SessionEvent::Heard(text.clone()));
                if super::persona::is_exit_phrase(&text) {
                    return self.exit(text).await;
                }
                self.answer(text).await
            }
        }
    }

    /// Text turn: commands (`reset`, `voice on`, `voice off`, exit phrases)
    /// or a question for the backend.
    pub async fn process_text(&mut self, text: &str) -> TurnResult {
        let text = text.trim();
        if text.is_empty() {
            return TurnResult::new(true, None, TurnOutcome::NoInput);
        }
        if self.interrupt.is_triggered() {
            self.stop();
            return TurnResult::failed(Some(text.to_string()), TurnFailure::Interrupted);
        }

        match Command::parse(text) {
            Some(Command::Exit) => self.exit(text.to_string()).await,
            Some(Command::Reset) => {
                self.reset();
                TurnResult::new(true, Some(text.to_string()), TurnOutcome::Reset)
            }
            Some(Command::VoiceOn) => {
                self.set_speak_output(true);
                TurnResult::new(true, Some(text.to_string()), TurnOutcome::VoiceOn)
            }
            Some(Command::VoiceOff) => {
                self.set_speak_output(false);
                TurnResult::new(true, Some(text.to_string()), TurnOutcome::VoiceOff)
            }
            None => self.answer(text.to_string()).await,
        }
    }

    /// Streamed text turn.  Fragments are handed to `on_fragment` as they
    /// arrive; the pair is committed only if the stream completes.
    pub async fn process_text_streaming<F>(&mut self, text: &str, on_fragment: F) -> TurnResult
    where
        F: FnMut(&str) + Send,
    {
        let text = text.trim();
        if text.is_empty() {
            return TurnResult::new(true, None, TurnOutcome::NoInput);
        }
        match Command::parse(text) {
            Some(Command::Exit) => return self.exit(text.to_string()).await,
            Some(Command::Reset) => {
                self.reset();
                return TurnResult::new(true, Some(text.to_string()), TurnOutcome::Reset);
            }
            _ => {}
        }

        match self.ask_streaming(text, on_fragment).await {
            Ok(reply) => {
                self.speak(&reply).await;
                TurnResult::answered(text.to_string(), reply)
            }
            Err(failure) => self.fail(Some(text.to_string()), failure),
        }
    }

    async fn exit(&mut self, input: String) -> TurnResult {
        log::info!("session: exit phrase {input:?}");
        self.speak_in(FAREWELL, detect(FAREWELL)).await;
        self.stop();
        TurnResult::new(false, Some(input), TurnOutcome::Exited)
    }

    async fn answer(&mut self, text: String) -> TurnResult {
        match self.ask(&text).await {
            Ok(reply) => {
                self.speak(&reply).await;
                TurnResult::answered(text, reply)
            }
            Err(failure) => self.fail(Some(text), failure),
        }
    }

    fn fail(&mut self, input: Option<String>, failure: TurnFailure) -> TurnResult {
        match &failure {
            TurnFailure::Interrupted => self.stop(),
            other => {
                log::warn!("session: turn failed: {other}");
                self.state = SessionState::Idle;
            }
        }
        TurnResult::failed(input, failure)
    }

    // -----------------------------------------------------------------------
    // Backend
    // -----------------------------------------------------------------------

    /// Ask the backend about `text` and commit the pair on success.
    pub async fn ask(&mut self, text: &str) -> Result<String, TurnFailure> {
        self.state = SessionState::Thinking;
        self.emit(SessionEvent::Thinking);
        let request = self.history.with_pending(text);
        let backend = Arc::clone(&self.backend);
        let interrupt = self.interrupt.clone();

        let result = tokio::select! {
            r = tokio::time::timeout(self.config.backend_timeout, backend.complete(&request)) => r,
            _ = interrupt.triggered() => return Err(TurnFailure::Interrupted),
        };

        let reply = match result {
            Ok(Ok(reply)) => reply.trim().to_string(),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ChatError::Timeout.into()),
        };
        if reply.is_empty() {
            return Err(ChatError::EmptyResponse.into());
        }
        self.history.commit_pair(text, reply.clone());
        self.emit(SessionEvent::Reply(reply.clone()));
        Ok(reply)
    }

    /// Streamed variant of [`ask`](Self::ask).  A stream that errors, times
    /// out, is interrupted or yields no text commits nothing.
    pub async fn ask_streaming<F>(&mut self, text: &str, mut on_fragment: F) -> Result<String, TurnFailure>
    where
        F: FnMut(&str) + Send,
    {
        self.state = SessionState::Thinking;
        self.emit(SessionEvent::Thinking);
        let request = self.history.with_pending(text);
        let backend = Arc::clone(&self.backend);
        let interrupt = self.interrupt.clone();
        let deadline = tokio::time::Instant::now() + self.config.backend_timeout;

        let opened = tokio::select! {
            r = tokio::time::timeout_at(deadline, backend.complete_stream(&request)) => r,
            _ = interrupt.triggered() => return Err(TurnFailure::Interrupted),
        };
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ChatError::Timeout.into()),
        };

        let mut reply = String::new();
        loop {
            let item = tokio::select! {
                item = tokio::time::timeout_at(deadline, stream.next()) => item,
                _ = interrupt.triggered() => return Err(TurnFailure::Interrupted),
            };
            match item {
                Ok(Some(Ok(fragment))) => {
                    on_fragment(&fragment);
                    reply.push_str(&fragment);
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => break,
                Err(_) => return Err(ChatError::Timeout.into()),
            }
        }

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(ChatError::EmptyResponse.into());
        }
        self.history.commit_pair(text, reply.clone());
        Ok(reply)
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Speak a reply in the configured or detected language.  `false` when
    /// voice output is off or synthesis failed; never an error.
    pub async fn speak(&mut self, text: &str) -> bool {
        let language = self
            .config
            .output_language
            .fixed()
            .unwrap_or_else(|| detect(text));
        self.speak_in(text, language).await
    }

    async fn speak_in(&mut self, text: &str, language: Language) -> bool {
        let output = match (&self.output, self.speak_output) {
            (Some(output), true) => Arc::clone(output),
            _ => {
                self.finish_turn_state();
                return false;
            }
        };

        self.state = SessionState::Speaking;
        self.emit(SessionEvent::Speaking(language));
        let interrupt = self.interrupt.clone();
        let spoken = tokio::select! {
            ok = output.synthesize(text, language) => ok,
            _ = interrupt.triggered() => false,
        };
        self.emit(SessionEvent::Spoken(spoken));
        if !spoken {
            log::warn!("session: reply was not spoken");
        }
        self.finish_turn_state();
        spoken
    }

    fn finish_turn_state(&mut self) {
        if self.interrupt.is_triggered() {
            self.state = SessionState::Stopped;
        } else if !self.state.is_terminal() {
            self.state = SessionState::Idle;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

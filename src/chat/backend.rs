//! Core `ChatBackend` trait, its error type, and the fragment stream used for
//! streamed completions.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::chat::message::Message;
use crate::config::CredentialError;

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Errors that can occur while asking a backend for a completion.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key was found for the provider.
    #[error(transparent)]
    CredentialMissing(#[from] CredentialError),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The provider answered with a non-success status or an error object.
    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be parsed as expected.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider returned no usable text.
    #[error("empty response")]
    EmptyResponse,

    /// The history handed to the backend had no user message to answer.
    #[error("no user message to send")]
    NoUserMessage,
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else if e.is_decode() {
            ChatError::MalformedResponse(e.to_string())
        } else {
            ChatError::Transport(e.to_string())
        }
    }
}

/// Keep provider error bodies readable in logs and on screen.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    if body.chars().count() <= LIMIT {
        body.trim().to_string()
    } else {
        let cut: String = body.chars().take(LIMIT).collect();
        format!("{}…", cut.trim_end())
    }
}

// ---------------------------------------------------------------------------
// FragmentStream
// ---------------------------------------------------------------------------

/// A lazily produced, finite, non-restartable sequence of text fragments.
///
/// Fragments are pulled with [`next`](Self::next) until it returns `None`.
/// An `Err` item ends the stream.  Concatenating every fragment of a stream
/// that ended without error gives the same text as the non-streaming call.
/// Dropping the stream cancels the producer: its next send fails and it
/// stops reading from the network.
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<String, ChatError>>,
    finished: bool,
}

/// Producer half handed to the task that feeds a [`FragmentStream`].
pub type FragmentSender = mpsc::Sender<Result<String, ChatError>>;

impl FragmentStream {
    /// Create a connected sender/stream pair.
    pub fn channel(capacity: usize) -> (FragmentSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                rx,
                finished: false,
            },
        )
    }

    /// A stream that yields `text` as its only fragment.
    pub fn once(text: String) -> Self {
        let (tx, stream) = Self::channel(1);
        // Capacity 1 and a fresh channel: this send cannot fail.
        let _ = tx.try_send(Ok(text));
        stream
    }

    /// Pull the next fragment.  Returns `None` forever once the stream has
    /// ended or produced an error.
    pub async fn next(&mut self) -> Option<Result<String, ChatError>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Ok(fragment)) => Some(Ok(fragment)),
            Some(Err(e)) => {
                self.finished = true;
                self.rx.close();
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// Async interface over one remote chat or translation provider.
///
/// Implementors must be `Send + Sync` so they can be held behind an
/// `Arc<dyn ChatBackend>`.  `history` is borrowed and never modified; any
/// failure is reported as an `Err` and never as partial text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Produce the assistant reply to `history`.
    async fn complete(&self, history: &[Message]) -> Result<String, ChatError>;

    /// Streamed variant of [`complete`](Self::complete).
    ///
    /// The default implementation yields the whole completion as a single
    /// fragment, for providers without a streaming endpoint.
    async fn complete_stream(&self, history: &[Message]) -> Result<FragmentStream, ChatError> {
        let text = self.complete(history).await?;
        Ok(FragmentStream::once(text))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Session state machine.

/// States of a conversation session.
///
/// ```text
/// Idle ──capture──▶ Listening ──text──▶ Thinking ──reply──▶ Speaking ──▶ Idle
///   ▲                  │ timeout / unintelligible   │ backend failure
///   └──────────────────┴────────────────────────────┘
/// any state ──exit phrase / interrupt──▶ Stopped
/// ```
///
/// Text-mode turns skip `Listening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Between turns.
    #[default]
    Idle,
    /// Waiting for the microphone phrase and its transcript.
    Listening,
    /// The backend call is in flight.
    Thinking,
    /// The reply is being synthesised.
    Speaking,
    /// Terminal: exit phrase or external interrupt.
    Stopped,
}

impl SessionState {
    /// `true` while a turn is being processed.
    ///
    /// ```
    /// use translator_mini::session::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_busy());
    /// assert!(SessionState::Thinking.is_busy());
    /// assert!(!SessionState::Stopped.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Listening | SessionState::Thinking | SessionState::Speaking
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == SessionState::Stopped
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Listening => "Listening",
            SessionState::Thinking => "Thinking",
            SessionState::Speaking => "Speaking",
            SessionState::Stopped => "Stopped",
        }
    }
}

//! Sessions: the turn loops behind every CLI mode.
//!
//! * [`ConversationSession`] – assistant and chat modes (bounded history)
//! * [`TranslatorSession`] – plain translation, no history

pub mod conversation;
pub mod interrupt;
pub mod persona;
pub mod state;
pub mod translator;

pub use conversation::{
    ConversationSession, EventSink, SessionConfig, SessionEvent, TurnFailure, TurnOutcome,
    TurnResult,
};
pub use interrupt::Interrupt;
pub use persona::{is_exit_phrase, Command};
pub use state::SessionState;
pub use translator::{Translation, TranslatorSession};

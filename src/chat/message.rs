//! Chat messages and the bounded conversation history.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Role / Message
// ---------------------------------------------------------------------------

/// Author of a [`Message`].  Serialises to the lower-case wire names used by
/// OpenAI-compatible APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Tag used when a conversation is flattened into a single prompt.
    pub fn tag(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Content of the last user message in `messages`, if any.
pub fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(Message::content)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Ordered conversation that always starts with exactly one system message.
///
/// Holds at most `max_history` messages after the system message.  Messages
/// are only ever added as a user/assistant pair through
/// [`commit_pair`](Self::commit_pair); when the cap is exceeded the oldest
/// messages after the system prompt are dropped.  If dropping leaves an
/// assistant reply at the front (possible only with an odd cap), that reply
/// is dropped as well, so the retained history never opens with an answer to
/// a question it no longer contains.
#[derive(Debug, Clone)]
pub struct History {
    messages: Vec<Message>,
    max_history: usize,
}

impl History {
    /// Start a history holding only `system_prompt`.
    pub fn new(system_prompt: impl Into<String>, max_history: usize) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            max_history,
        }
    }

    /// All messages, system message first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_prompt(&self) -> &str {
        self.messages[0].content()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Total message count, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// `true` while no turn has been committed.
    pub fn is_empty(&self) -> bool {
        self.messages.len() == 1
    }

    /// Copy of the history with `user_text` appended, for a request that has
    /// not succeeded yet.  The history itself is not touched.
    pub fn with_pending(&self, user_text: &str) -> Vec<Message> {
        let mut request = Vec::with_capacity(self.messages.len() + 1);
        request.extend_from_slice(&self.messages);
        request.push(Message::user(user_text));
        request
    }

    /// Append a completed user/assistant exchange and enforce the cap.
    pub fn commit_pair(&mut self, user_text: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(Message::user(user_text));
        self.messages.push(Message::assistant(reply));
        self.trim();
    }

    /// Drop everything except the system message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    fn trim(&mut self) {
        let excess = (self.messages.len() - 1).saturating_sub(self.max_history);
        if excess > 0 {
            self.messages.drain(1..1 + excess);
        }
        while self.messages.len() > 1 && self.messages[1].role == Role::Assistant {
            self.messages.remove(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run_turns(history: &mut History, turns: usize) {
        for i in 1..=turns {
            history.commit_pair(format!("q{i}"), format!("a{i}"));
        }
    }

    #[test]
    fn new_history_holds_only_system() {
        let h = History::new("persona", 4);
        assert_eq!(h.len(), 1);
        assert!(h.is_empty());
        assert_eq!(h.messages()[0].role(), Role::System);
        assert_eq!(h.system_prompt(), "persona");
    }

    #[test]
    fn cap_of_four_keeps_last_two_pairs() {
        let mut h = History::new("persona", 4);
        run_turns(&mut h, 3);

        assert_eq!(h.len(), 5);
        let contents: Vec<&str> = h.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["persona", "q2", "a2", "q3", "a3"]);
    }

    #[test]
    fn system_message_survives_any_number_of_turns() {
        let mut h = History::new("persona", 6);
        for n in 1..=20 {
            run_turns(&mut h, 1);
            assert!(h.len() <= 7, "turn {n}: len {}", h.len());
            assert_eq!(h.messages()[0].role(), Role::System);
        }
    }

    #[test]
    fn odd_cap_never_starts_with_assistant() {
        let mut h = History::new("persona", 3);
        run_turns(&mut h, 4);

        assert!(h.len() <= 4);
        assert_eq!(h.messages()[1].role(), Role::User);
        let contents: Vec<&str> = h.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["persona", "q4", "a4"]);
    }

    #[test]
    fn zero_cap_keeps_only_system() {
        let mut h = History::new("persona", 0);
        run_turns(&mut h, 2);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn with_pending_does_not_mutate() {
        let mut h = History::new("persona", 4);
        run_turns(&mut h, 1);

        let request = h.with_pending("next");
        assert_eq!(request.len(), 4);
        assert_eq!(request.last().map(Message::content), Some("next"));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn reset_returns_to_system_only() {
        let mut h = History::new("persona", 4);
        run_turns(&mut h, 2);
        h.reset();
        assert_eq!(h.len(), 1);
        assert_eq!(h.system_prompt(), "persona");
    }

    #[test]
    fn last_user_text_finds_latest() {
        let msgs = vec![
            Message::system("s"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        assert_eq!(last_user_text(&msgs), Some("second"));
        assert_eq!(last_user_text(&msgs[..1]), None);
    }

    #[test]
    fn role_serialises_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}

//! Fixed prompts and phrases used by the sessions.

/// System prompt for the spoken assistant ("Mini").
pub const VOICE_ASSISTANT_PROMPT: &str = "Bạn là trợ lý giọng nói AI thông minh tên là Mini, nói tiếng Việt. \
Trả lời ngắn gọn và tự nhiên như đang nói chuyện. \
QUAN TRỌNG: Khi người dùng nói 'dịch' hoặc 'translate' kèm theo một câu tiếng Anh, \
hãy dịch câu đó sang tiếng Việt. Ví dụ: 'dịch I love you' → 'Tôi yêu bạn'. \
Chỉ trả về bản dịch, không giải thích thêm. \
Nếu không phải yêu cầu dịch, hãy trả lời bằng tiếng Việt.";

/// System prompt for the typed assistant.
pub const TEXT_ASSISTANT_PROMPT: &str = "Bạn là trợ lý AI thông minh tên là Mini, nói tiếng Việt. \
Trả lời ngắn gọn và tự nhiên. \
QUAN TRỌNG: Khi người dùng nói 'dịch' hoặc 'translate' kèm theo một câu tiếng Anh, \
hãy dịch câu đó sang tiếng Việt. Ví dụ: 'dịch I love you' → 'Tôi yêu bạn'. \
Chỉ trả về bản dịch, không giải thích thêm. \
Nếu không phải yêu cầu dịch, hãy trả lời bằng tiếng Việt.";

/// System prompt for direct bilingual chat.
pub const CHAT_PROMPT: &str = "Bạn là trợ lý AI thông minh, có thể nói tiếng Việt và tiếng Anh. \
You are a smart AI assistant that can speak both Vietnamese and English. \
Trả lời bằng ngôn ngữ mà người dùng sử dụng. \
Reply in the same language the user uses. \
Trả lời ngắn gọn, rõ ràng và hữu ích.";

pub const GREETING: &str = "Xin chào! Tôi là Mini, trợ lý AI của bạn. \
Bạn có thể hỏi tôi bất cứ điều gì, hoặc nói 'dịch' kèm câu tiếng Anh để tôi dịch sang tiếng Việt.";

pub const FAREWELL: &str = "Tạm biệt! Hẹn gặp lại! Goodbye!";

/// Phrases that end a session, in both languages.
pub const EXIT_PHRASES: &[&str] = &[
    "quit",
    "exit",
    "bye",
    "goodbye",
    "thoát",
    "tạm biệt",
    "kết thúc",
    "dừng lại",
];

/// Exact match after trimming, ignoring case.
pub fn is_exit_phrase(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    EXIT_PHRASES.contains(&normalized.as_str())
}

/// Typed commands understood by the text sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Reset,
    VoiceOn,
    VoiceOff,
}

impl Command {
    pub fn parse(text: &str) -> Option<Command> {
        if is_exit_phrase(text) {
            return Some(Command::Exit);
        }
        match text.trim().to_lowercase().as_str() {
            "reset" => Some(Command::Reset),
            "voice on" => Some(Command::VoiceOn),
            "voice off" => Some(Command::VoiceOff),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_phrases_match_trimmed_and_case_insensitive() {
        assert!(is_exit_phrase("quit"));
        assert!(is_exit_phrase("  QUIT \n"));
        assert!(is_exit_phrase("Thoát"));
        assert!(is_exit_phrase("Tạm Biệt"));
    }

    #[test]
    fn exit_phrase_must_match_exactly() {
        assert!(!is_exit_phrase("please quit"));
        assert!(!is_exit_phrase("quit now"));
        assert!(!is_exit_phrase(""));
    }

    #[test]
    fn commands() {
        assert_eq!(Command::parse("Reset"), Some(Command::Reset));
        assert_eq!(Command::parse("voice ON"), Some(Command::VoiceOn));
        assert_eq!(Command::parse("voice off "), Some(Command::VoiceOff));
        assert_eq!(Command::parse("dừng lại"), Some(Command::Exit));
        assert_eq!(Command::parse("dịch I love you"), None);
    }
}

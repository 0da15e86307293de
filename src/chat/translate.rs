//! Translation backends.
//!
//! Both backends implement [`ChatBackend`] and translate the last user
//! message of the history they are handed, so the translator session can
//! swap one for the other:
//!
//! * [`GoogleTranslateBackend`] uses the free Google Translate endpoint and
//!   needs no key.
//! * [`LlmTranslateBackend`] wraps any chat backend and prompts it as a
//!   professional translator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::backend::{truncate_body, ChatBackend, ChatError};
use crate::chat::message::{last_user_text, Message};
use crate::config::TranslateDirection;
use crate::language::{detect, Language};

/// Sampling temperature for translation prompts.
pub const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// Source and target language for `text` under `direction`.
pub fn resolve_direction(direction: TranslateDirection, text: &str) -> (Language, Language) {
    match direction {
        TranslateDirection::EnToVi => (Language::En, Language::Vi),
        TranslateDirection::ViToEn => (Language::Vi, Language::En),
        TranslateDirection::Auto => {
            let source = detect(text);
            (source, source.other())
        }
    }
}

// ---------------------------------------------------------------------------
// GoogleTranslateBackend
// ---------------------------------------------------------------------------

pub struct GoogleTranslateBackend {
    client: reqwest::Client,
    endpoint: String,
    direction: TranslateDirection,
}

impl GoogleTranslateBackend {
    pub fn new(endpoint: impl Into<String>, direction: TranslateDirection, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            direction,
        }
    }
}

#[async_trait]
impl ChatBackend for GoogleTranslateBackend {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
        let text = last_user_text(history).ok_or(ChatError::NoUserMessage)?;
        let (source, target) = resolve_direction(self.direction, text);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source.code()),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }
        parse_translation(&body)
    }
}

/// Join the translated segments of a `translate_a/single?dt=t` response.
///
/// The body is a nested array whose first element lists segments as
/// `[translated, original, …]`.
pub(crate) fn parse_translation(body: &str) -> Result<String, ChatError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    let segments = json[0]
        .as_array()
        .ok_or_else(|| ChatError::MalformedResponse("missing segment list".into()))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment[0].as_str())
        .collect();

    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::EmptyResponse);
    }
    Ok(text.to_string())
}

// ---------------------------------------------------------------------------
// LlmTranslateBackend
// ---------------------------------------------------------------------------

/// Prompt pair (system, user) that asks a chat model for a bare translation.
pub fn translation_prompt(direction: TranslateDirection, text: &str) -> [Message; 2] {
    match direction {
        TranslateDirection::EnToVi => [
            Message::system(
                "Bạn là một dịch giả chuyên nghiệp Anh-Việt. \
                 Chỉ trả về bản dịch tiếng Việt, không giải thích thêm.",
            ),
            Message::user(format!("Dịch sang tiếng Việt: {text}")),
        ],
        TranslateDirection::ViToEn => [
            Message::system(
                "You are a professional Vietnamese-English translator. \
                 Only return the English translation, no explanations.",
            ),
            Message::user(format!("Translate to English: {text}")),
        ],
        TranslateDirection::Auto => [
            Message::system(
                "You are a bilingual translator. \
                 If the input is English, translate to Vietnamese. \
                 If the input is Vietnamese, translate to English. \
                 Only return the translation, no explanations.",
            ),
            Message::user(text),
        ],
    }
}

/// Translation through a chat model.  Build the inner backend with
/// [`TRANSLATION_TEMPERATURE`].
pub struct LlmTranslateBackend {
    inner: Arc<dyn ChatBackend>,
    direction: TranslateDirection,
}

impl LlmTranslateBackend {
    pub fn new(inner: Arc<dyn ChatBackend>, direction: TranslateDirection) -> Self {
        Self { inner, direction }
    }
}

#[async_trait]
impl ChatBackend for LlmTranslateBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
        let text = last_user_text(history).ok_or(ChatError::NoUserMessage)?;
        let prompt = translation_prompt(self.direction, text);
        self.inner.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fixed_directions() {
        assert_eq!(
            resolve_direction(TranslateDirection::EnToVi, "anything"),
            (Language::En, Language::Vi)
        );
        assert_eq!(
            resolve_direction(TranslateDirection::ViToEn, "anything"),
            (Language::Vi, Language::En)
        );
    }

    #[test]
    fn auto_direction_follows_detection() {
        assert_eq!(
            resolve_direction(TranslateDirection::Auto, "Tôi muốn uống cà phê"),
            (Language::Vi, Language::En)
        );
        assert_eq!(
            resolve_direction(TranslateDirection::Auto, "I would like a coffee"),
            (Language::En, Language::Vi)
        );
    }

    #[test]
    fn segments_are_joined() {
        let body = r#"[[["Xin chào. ","Hello. ",null,null,10],["Bạn khỏe không?","How are you?",null,null,10]],null,"en"]"#;
        assert_eq!(parse_translation(body).unwrap(), "Xin chào. Bạn khỏe không?");
    }

    #[test]
    fn empty_or_garbage_translation() {
        assert!(matches!(
            parse_translation(r#"[[["  ","x"]],null,"en"]"#),
            Err(ChatError::EmptyResponse)
        ));
        assert!(matches!(
            parse_translation("not json"),
            Err(ChatError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_translation(r#"[null]"#),
            Err(ChatError::MalformedResponse(_))
        ));
    }

    #[test]
    fn prompts_embed_the_text() {
        let [system, user] = translation_prompt(TranslateDirection::EnToVi, "good morning");
        assert!(system.content().contains("Anh-Việt"));
        assert_eq!(user.content(), "Dịch sang tiếng Việt: good morning");

        let [_, user] = translation_prompt(TranslateDirection::ViToEn, "chào buổi sáng");
        assert_eq!(user.content(), "Translate to English: chào buổi sáng");

        let [_, user] = translation_prompt(TranslateDirection::Auto, "hello");
        assert_eq!(user.content(), "hello");
    }

    /// Records what it was asked and echoes a fixed reply.
    struct Recorder {
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ChatBackend for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
            *self.seen.lock().unwrap() = history.to_vec();
            Ok("xin chào".into())
        }
    }

    #[tokio::test]
    async fn llm_backend_sends_only_the_translation_prompt() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let backend = LlmTranslateBackend::new(recorder.clone(), TranslateDirection::EnToVi);

        let history = vec![
            Message::system("unrelated persona"),
            Message::user("hello"),
        ];
        assert_eq!(backend.complete(&history).await.unwrap(), "xin chào");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].content(), "Dịch sang tiếng Việt: hello");
    }

    #[tokio::test]
    async fn missing_user_message_is_an_error() {
        let backend = GoogleTranslateBackend::new(
            "http://127.0.0.1:9/unused",
            TranslateDirection::EnToVi,
            Duration::from_secs(1),
        );
        assert!(matches!(
            backend.complete(&[Message::system("s")]).await,
            Err(ChatError::NoUserMessage)
        ));
    }
}

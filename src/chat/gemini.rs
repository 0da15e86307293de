//! Google Gemini backend (direct API, no OpenRouter).
//!
//! Gemini has no system role in the simple `generateContent` call, so the
//! whole history is flattened into one tagged prompt:
//!
//! ```text
//! System: <persona>
//! User: <question>
//! Assistant: <answer>
//! User: <question>
//! Assistant:
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::chat::backend::{truncate_body, ChatBackend, ChatError, FragmentStream};
use crate::chat::message::Message;
use crate::chat::models;
use crate::chat::sse::pump_sse;
use crate::config::{ChatConfig, ChatProvider};

const STREAM_BUFFER: usize = 32;

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiBackend {
    pub fn from_config(config: &ChatConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.gemini_url.trim_end_matches('/').to_string(),
            api_key,
            model: models::resolve(ChatProvider::Gemini, &config.model).to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn request_body(&self, history: &[Message]) -> serde_json::Value {
        serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": flatten_prompt(history) } ] }
            ],
            "generationConfig": {
                "temperature":     self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        })
    }

    async fn send(
        &self,
        history: &[Message],
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .query(query)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(history))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
        let response = self.send(history, "generateContent", &[]).await?;
        let body = response.text().await?;
        parse_response(&body)
    }

    async fn complete_stream(&self, history: &[Message]) -> Result<FragmentStream, ChatError> {
        let response = self
            .send(history, "streamGenerateContent", &[("alt", "sse")])
            .await?;
        let (tx, stream) = FragmentStream::channel(STREAM_BUFFER);
        tokio::spawn(pump_sse(response, tx, parse_stream_chunk));
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Prompt / response helpers
// ---------------------------------------------------------------------------

/// Flatten `history` into the tagged single-prompt form, ending with an open
/// `Assistant:` line for the model to complete.
pub fn flatten_prompt(history: &[Message]) -> String {
    let mut lines: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role().tag(), m.content()))
        .collect();
    lines.push("Assistant:".to_string());
    lines.join("\n")
}

/// Concatenated text of the first candidate, or `None` when it has none.
fn candidate_text(json: &serde_json::Value) -> Option<String> {
    let parts = json["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    Some(text)
}

pub(crate) fn parse_response(body: &str) -> Result<String, ChatError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(api_error(err));
    }

    match candidate_text(&json) {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(ChatError::EmptyResponse),
        // Blocked prompts come back with `promptFeedback` and no candidates.
        None if json.get("promptFeedback").is_some() => Err(ChatError::EmptyResponse),
        None => Err(ChatError::MalformedResponse(
            "missing candidates[0].content.parts".into(),
        )),
    }
}

pub(crate) fn parse_stream_chunk(data: &str) -> Result<Option<String>, ChatError> {
    let json: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(api_error(err));
    }
    Ok(candidate_text(&json).filter(|t| !t.is_empty()))
}

fn api_error(err: &serde_json::Value) -> ChatError {
    ChatError::Api {
        status: err["code"].as_u64().unwrap_or(0) as u16,
        message: truncate_body(err["message"].as_str().unwrap_or("unknown error")),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .map(|m| truncate_body(&m))
        .unwrap_or_else(|| truncate_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemini_config() -> ChatConfig {
        ChatConfig {
            provider: ChatProvider::Gemini,
            model: "gemini-2-flash".into(),
            ..ChatConfig::default()
        }
    }

    #[test]
    fn flatten_tags_every_role_and_leaves_assistant_open() {
        let history = vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Dịch: cat"),
        ];
        assert_eq!(
            flatten_prompt(&history),
            "System: Be brief.\nUser: Hi\nAssistant: Hello!\nUser: Dịch: cat\nAssistant:"
        );
    }

    #[test]
    fn endpoint_uses_resolved_model() {
        let backend = GeminiBackend::from_config(&gemini_config(), "k".into());
        assert_eq!(
            backend.endpoint("generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn request_body_shape() {
        let backend = GeminiBackend::from_config(&gemini_config(), "k".into());
        let body = backend.request_body(&[Message::user("hi")]);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "User: hi\nAssistant:");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn parts_are_concatenated() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Xin "},{"text":"chào\n"}]}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Xin chào\n");
    }

    #[test]
    fn response_and_stream_chunk_agree_on_whitespace() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"\n\nXin chào! "}]}}]}"#;
        let whole = parse_response(body).unwrap();
        assert_eq!(whole, "\n\nXin chào! ");
        assert_eq!(parse_stream_chunk(body).unwrap(), Some(whole));
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(parse_response(body), Err(ChatError::EmptyResponse)));
    }

    #[test]
    fn error_object_is_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            parse_response(body),
            Err(ChatError::Api { status: 400, .. })
        ));
    }

    #[test]
    fn stream_chunk_text() {
        let chunk = r#"{"candidates":[{"content":{"parts":[{"text":"Hel"}]}}]}"#;
        assert_eq!(parse_stream_chunk(chunk).unwrap().as_deref(), Some("Hel"));
        let usage_only = r#"{"usageMetadata":{"totalTokenCount":5}}"#;
        assert_eq!(parse_stream_chunk(usage_only).unwrap(), None);
    }
}

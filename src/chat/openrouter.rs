//! OpenRouter chat-completions backend.
//!
//! Speaks the OpenAI wire format against `ChatConfig::openrouter_url`, with
//! the `HTTP-Referer` / `X-Title` attribution headers OpenRouter asks for.
//! Streaming uses server-sent events (`"stream": true`).

use std::time::Duration;

use async_trait::async_trait;

use crate::chat::backend::{truncate_body, ChatBackend, ChatError, FragmentStream};
use crate::chat::message::Message;
use crate::chat::models;
use crate::chat::sse::pump_sse;
use crate::config::{ChatConfig, ChatProvider};

/// Channel depth between the SSE reader task and the consumer.
const STREAM_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// OpenRouterBackend
// ---------------------------------------------------------------------------

pub struct OpenRouterBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    site_url: String,
    site_name: String,
}

impl OpenRouterBackend {
    /// Build a backend from config.  `config.model` may be an alias.
    pub fn from_config(config: &ChatConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.openrouter_url.clone(),
            api_key,
            model: models::resolve(ChatProvider::OpenRouter, &config.model).to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
        }
    }

    /// Override the sampling temperature (translation prompts run cooler).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, history: &[Message], stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model":       self.model,
            "messages":    history,
            "temperature": self.temperature,
            "max_tokens":  self.max_tokens,
            "stream":      stream,
        })
    }

    async fn send(&self, history: &[Message], stream: bool) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.site_name)
            .json(&self.request_body(history, stream))
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
impl ChatBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, history: &[Message]) -> Result<String, ChatError> {
        let response = self.send(history, false).await?;
        let body = response.text().await?;
        parse_completion(&body)
    }

    async fn complete_stream(&self, history: &[Message]) -> Result<FragmentStream, ChatError> {
        let response = self.send(history, true).await?;
        let (tx, stream) = FragmentStream::channel(STREAM_BUFFER);
        tokio::spawn(pump_sse(response, tx, parse_stream_delta));
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract the reply from a non-streamed completion body.
pub(crate) fn parse_completion(body: &str) -> Result<String, ChatError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(api_error(err));
    }

    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ChatError::MalformedResponse("missing choices[0].message.content".into()))?;

    if content.trim().is_empty() {
        return Err(ChatError::EmptyResponse);
    }
    Ok(content.to_string())
}

/// Extract the content delta from one streamed `data:` payload.
///
/// Role-only and finish chunks carry no content and yield `Ok(None)`.
pub(crate) fn parse_stream_delta(data: &str) -> Result<Option<String>, ChatError> {
    let json: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(api_error(err));
    }

    Ok(json["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

fn api_error(err: &serde_json::Value) -> ChatError {
    let status = err["code"].as_u64().unwrap_or(0) as u16;
    let message = err["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    ChatError::Api {
        status,
        message: truncate_body(&message),
    }
}

/// Best human-readable message from an error response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .map(|m| truncate_body(&m))
        .unwrap_or_else(|| truncate_body(body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

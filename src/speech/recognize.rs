//! Remote speech recognition.
//!
//! [`GoogleSpeechRecognizer`] posts 16 kHz L16 audio to the free Google
//! web-speech endpoint.  The endpoint answers with one JSON object per line;
//! the first line is usually an empty `{"result":[]}` and the transcript, if
//! any, follows.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::phrase::AudioClip;

#[derive(Debug, Error)]
pub enum RecognizeError {
    /// The service heard nothing it could transcribe.
    #[error("no transcript")]
    NoMatch,

    #[error("recognition request failed: {0}")]
    Transport(String),

    #[error("recognition service returned HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for RecognizeError {
    fn from(e: reqwest::Error) -> Self {
        RecognizeError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribe `clip` assuming BCP-47 `locale`.
    async fn recognize(&self, clip: &AudioClip, locale: &str) -> Result<String, RecognizeError>;
}

pub struct GoogleSpeechRecognizer {
    client: reqwest::Client,
    url: String,
    key: String,
}

impl GoogleSpeechRecognizer {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl Recognizer for GoogleSpeechRecognizer {
    async fn recognize(&self, clip: &AudioClip, locale: &str) -> Result<String, RecognizeError> {
        if clip.is_empty() {
            return Err(RecognizeError::NoMatch);
        }

        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("client", "chromium"),
                ("lang", locale),
                ("key", self.key.as_str()),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/l16; rate={}", clip.sample_rate()),
            )
            .body(clip.to_l16())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognizeError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_recognition(&body).ok_or(RecognizeError::NoMatch)
    }
}

/// First non-empty transcript in a line-delimited recognition response.
pub(crate) fn parse_recognition(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find_map(|json| {
            let transcript = json["result"][0]["alternative"][0]["transcript"].as_str()?;
            let transcript = transcript.trim();
            (!transcript.is_empty()).then(|| transcript.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_result_line() {
        let body = concat!(
            "{\"result\":[]}\n",
            "{\"result\":[{\"alternative\":[{\"transcript\":\"xin chào\",\"confidence\":0.93},",
            "{\"transcript\":\"xin chao\"}],\"final\":true}],\"result_index\":0}\n"
        );
        assert_eq!(parse_recognition(body).as_deref(), Some("xin chào"));
    }

    #[test]
    fn nothing_recognised() {
        assert_eq!(parse_recognition("{\"result\":[]}\n"), None);
        assert_eq!(parse_recognition(""), None);
        assert_eq!(parse_recognition("<html>"), None);
    }

    #[tokio::test]
    async fn empty_clip_is_no_match_without_network() {
        let recognizer = GoogleSpeechRecognizer::new("http://127.0.0.1:9/unused", "k");
        assert!(matches!(
            recognizer.recognize(&AudioClip::default(), "en-US").await,
            Err(RecognizeError::NoMatch)
        ));
    }
}

//! Network synthesis through the Google Translate TTS endpoint.
//!
//! The endpoint only accepts short text, so replies are split into chunks of
//! at most [`MAX_CHUNK_CHARS`] characters on sentence or word boundaries.
//! The MP3 responses are concatenated into one temp file and played with
//! [`play_file`](super::playback::play_file).

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use super::output::{SynthesisEngine, SynthesisError};
use super::playback::play_file;
use crate::config::TtsConfig;
use crate::language::Language;

pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct GoogleTtsEngine {
    client: reqwest::Client,
    url: String,
    volume: f32,
    playback_timeout: Duration,
}

impl GoogleTtsEngine {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: config.remote_url.clone(),
            volume: config.volume,
            playback_timeout: Duration::from_secs_f32(config.playback_timeout_secs.max(0.0)),
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        language: Language,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, SynthesisError> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language.code()),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Network(format!("HTTP {status}")));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SynthesisEngine for GoogleTtsEngine {
    fn name(&self) -> &str {
        "google-tts"
    }

    async fn speak(&self, text: &str, language: Language) -> Result<(), SynthesisError> {
        let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Ok(());
        }

        let mut file = tempfile::Builder::new()
            .prefix("translator-mini-")
            .suffix(".mp3")
            .tempfile()?;
        for (idx, chunk) in chunks.iter().enumerate() {
            let audio = self.fetch_chunk(chunk, language, idx, chunks.len()).await?;
            file.write_all(&audio)?;
        }
        file.flush()?;
        log::debug!("google-tts: {} chunk(s) fetched ({language})", chunks.len());

        let timeout = self.playback_timeout;
        let volume = self.volume;
        tokio::task::spawn_blocking(move || -> Result<(), SynthesisError> {
            let result = play_file(file.path(), timeout, volume);
            close_quietly(file);
            result
        })
        .await
        .map_err(|e| SynthesisError::Playback(e.to_string()))?
    }
}

/// Deleting the temp file may fail while the OS still holds it; that is
/// only worth a debug line.
fn close_quietly(file: NamedTempFile) {
    if let Err(e) = file.close() {
        log::debug!("google-tts: temp file cleanup failed: {e}");
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Sentence ends are preferred, then word boundaries; a single word longer
/// than `max_chars` is hard-split.
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for sentence in sentences(text) {
        let mut current = String::new();
        for word in sentence.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if current_len > 0 && current_len + 1 + word_len > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if word_len > max_chars {
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_chars) {
                    chunks.push(piece.iter().collect());
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }
    chunks
}

/// Sentences with their terminating punctuation kept.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n' | ';' | '。') {
            let end = i + c.len_utf8();
            let piece = text[start..end].trim();
            if !piece.is_empty() {
                out.push(piece);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_for_tts("Xin chào!", 100), vec!["Xin chào!"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_for_tts("   ", 100).is_empty());
    }

    #[test]
    fn chunks_respect_limit_in_characters() {
        let text = "Tiếng Việt có nhiều dấu thanh điệu ".repeat(20);
        let chunks = split_for_tts(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "too long: {chunk}");
        }
        // No words are lost.
        let rejoined = chunks.join(" ");
        assert_eq!(
            rejoined.split_whitespace().count(),
            text.split_whitespace().count()
        );
    }

    #[test]
    fn sentences_split_first() {
        let chunks = split_for_tts("Hello there. How are you? Fine", 100);
        assert_eq!(chunks, vec!["Hello there.", "How are you?", "Fine"]);
    }

    #[test]
    fn overlong_word_is_hard_split() {
        let chunks = split_for_tts(&"a".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 5);
    }
}

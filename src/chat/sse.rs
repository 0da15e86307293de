//! Minimal server-sent-events line reader for streamed completions.
//!
//! Network chunks can split a line, or even a multi-byte UTF-8 character, so
//! raw bytes are buffered and only complete lines are decoded.

use crate::chat::backend::{ChatError, FragmentSender};

/// Turns one `data:` payload into an optional text fragment.
pub type DeltaParser = fn(&str) -> Result<Option<String>, ChatError>;

/// What one SSE line carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A `data:` payload.
    Data(String),
    /// The `data: [DONE]` sentinel.
    Done,
    /// Blank separators, comments (`: keep-alive`), `event:` lines, …
    Other,
}

#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line, or `None` until more bytes arrive.
    pub fn next_line(&mut self) -> Option<SseLine> {
        let newline = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=newline).collect();
        let text = String::from_utf8_lossy(&line);
        Some(classify(text.trim_end_matches(['\n', '\r'])))
    }

    /// Classify a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<SseLine> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest);
        Some(classify(text.trim_end_matches(['\n', '\r'])))
    }
}

fn classify(line: &str) -> SseLine {
    match line.strip_prefix("data:") {
        Some(data) => {
            let data = data.trim_start();
            if data == "[DONE]" {
                SseLine::Done
            } else {
                SseLine::Data(data.to_string())
            }
        }
        None => SseLine::Other,
    }
}

/// Read SSE chunks from `response` and forward parsed fragments to `tx`.
///
/// Ends at `[DONE]`, at the end of the body, on the first error (which is
/// forwarded) or when the receiving stream is dropped.
pub async fn pump_sse(mut response: reqwest::Response, tx: FragmentSender, parse: DeltaParser) {
    let mut buffer = SseBuffer::new();
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };
        buffer.push_chunk(&chunk);
        while let Some(line) = buffer.next_line() {
            if !forward_line(line, &tx, parse).await {
                return;
            }
        }
    }
    if let Some(line) = buffer.finish() {
        forward_line(line, &tx, parse).await;
    }
}

/// Returns `false` once the stream is over (sentinel, error or receiver gone).
async fn forward_line(line: SseLine, tx: &FragmentSender, parse: DeltaParser) -> bool {
    match line {
        SseLine::Done => false,
        SseLine::Other => true,
        SseLine::Data(data) => match parse(&data) {
            Ok(Some(fragment)) => tx.send(Ok(fragment)).await.is_ok(),
            Ok(None) => true,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::backend::FragmentStream;

    #[test]
    fn returns_complete_lines_only() {
        let mut buf = SseBuffer::new();
        buf.push_chunk(b"data: first\n\ndata: par");

        assert_eq!(buf.next_line(), Some(SseLine::Data("first".into())));
        assert_eq!(buf.next_line(), Some(SseLine::Other));
        assert_eq!(buf.next_line(), None);

        buf.push_chunk(b"tial\r\n");
        assert_eq!(buf.next_line(), Some(SseLine::Data("partial".into())));
    }

    #[test]
    fn utf8_split_across_chunks_is_preserved() {
        let bytes = "data: chào\n".as_bytes();
        // Split inside the two-byte 'à'.
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut buf = SseBuffer::new();
        buf.push_chunk(&bytes[..split]);
        assert_eq!(buf.next_line(), None);
        buf.push_chunk(&bytes[split..]);
        assert_eq!(buf.next_line(), Some(SseLine::Data("chào".into())));
    }

    #[test]
    fn done_sentinel_and_comments() {
        let mut buf = SseBuffer::new();
        buf.push_chunk(b": OPENROUTER PROCESSING\ndata: [DONE]\n");
        assert_eq!(buf.next_line(), Some(SseLine::Other));
        assert_eq!(buf.next_line(), Some(SseLine::Done));
    }

    fn echo(data: &str) -> Result<Option<String>, ChatError> {
        match data {
            "" => Ok(None),
            "bad" => Err(ChatError::MalformedResponse("bad".into())),
            other => Ok(Some(other.to_string())),
        }
    }

    #[tokio::test]
    async fn forward_line_stops_on_done_and_skips_comments() {
        let (tx, mut stream) = FragmentStream::channel(4);
        assert!(forward_line(SseLine::Other, &tx, echo).await);
        assert!(forward_line(SseLine::Data("".into()), &tx, echo).await);
        assert!(forward_line(SseLine::Data("a".into()), &tx, echo).await);
        assert!(!forward_line(SseLine::Done, &tx, echo).await);
        drop(tx);

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_error_is_forwarded_and_stops() {
        let (tx, mut stream) = FragmentStream::channel(4);
        assert!(!forward_line(SseLine::Data("bad".into()), &tx, echo).await);
        drop(tx);

        assert!(matches!(
            stream.next().await,
            Some(Err(ChatError::MalformedResponse(_)))
        ));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut buf = SseBuffer::new();
        buf.push_chunk(b"data: tail");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish(), Some(SseLine::Data("tail".into())));
        assert_eq!(buf.finish(), None);
    }
}

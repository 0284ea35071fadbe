//! Decoder for OpenAI-style `text/event-stream` completion bodies

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Token(String),
    Done,
}

/// Incremental decoder; feed raw body bytes as they arrive.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across network reads decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                let done = event == SseEvent::Done;
                events.push(event);
                if done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Decode whatever remains once the body has ended without a newline
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        parse_line(line.trim()).into_iter().collect()
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.trim() == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed stream line");
            return None;
        }
    };

    let content = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;

    if content.is_empty() {
        None
    } else {
        Some(SseEvent::Token(content.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_tokens_then_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n\n{}", delta("Hel"), delta("lo"), delta("ignored"));
        let events = decoder.push(body.as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent::Token("Hel".into()),
                SseEvent::Token("lo".into()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn test_split_across_reads() {
        let mut decoder = SseDecoder::new();
        let body = delta("héllo");
        let bytes = body.as_bytes();
        let mid = bytes.len() / 2;

        assert!(decoder.push(&bytes[..mid]).is_empty());
        assert_eq!(decoder.push(&bytes[mid..]), vec![SseEvent::Token("héllo".into())]);
    }

    #[test]
    fn test_skips_role_only_and_comments() {
        let mut decoder = SseDecoder::new();
        let body = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: not-json\n",
        );
        assert!(decoder.push(body.as_bytes()).is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Done]);
    }
}

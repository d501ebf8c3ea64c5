//! SSE event splitting and chunk-content extraction
//!
//! The backend delimits events with blank lines (`\n\n` or `\r\n\r\n`) and
//! prefixes payloads with `data: `. Payloads are either raw strings or JSON
//! objects carrying the content under one of several known fields.

use serde_json::Value;

/// Terminal sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental buffer that accumulates raw bytes and yields complete events.
#[derive(Default)]
pub struct SseBuffer {
    buf: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network chunk and drain every complete event's data payload.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut events = Vec::new();

        loop {
            // Accept both \n\n and \r\n\r\n delimiters, whichever comes first.
            let lf = self.buf.find("\n\n");
            let crlf = self.buf.find("\r\n\r\n");
            let (end, delim_len) = match (lf, crlf) {
                (Some(a), Some(b)) if b < a => (b, 4),
                (Some(a), _) => (a, 2),
                (None, Some(b)) => (b, 4),
                (None, None) => break,
            };

            let event = self.buf[..end].to_string();
            self.buf.drain(..end + delim_len);

            if let Some(data) = extract_data(&event) {
                events.push(data);
            }
        }

        events
    }
}

/// Join the `data:` lines of one event block.
fn extract_data(event: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in event.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data: ") {
            lines.push(rest);
        } else if let Some(rest) = line.strip_prefix("data:") {
            lines.push(rest);
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Extract the visible content from one event payload.
///
/// JSON payloads are probed for `content`, `text`, `delta.content`,
/// `choices[0].delta.content`, then `response`; anything unparseable is
/// forwarded verbatim.
pub fn extract_chunk(payload: &str) -> String {
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return payload.to_string(),
    };

    for field in ["content", "text"] {
        if let Some(s) = parsed.get(field).and_then(Value::as_str) {
            return s.to_string();
        }
    }
    if let Some(s) = parsed
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        return s.to_string();
    }
    if let Some(s) = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        return s.to_string();
    }
    if let Some(s) = parsed.get("response").and_then(Value::as_str) {
        return s.to_string();
    }

    payload.to_string()
}

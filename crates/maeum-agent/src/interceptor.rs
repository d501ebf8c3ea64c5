//! Mid-stream tool-block detection
//!
//! Consumes the raw token feed, forwards prose, and stops at the first
//! well-formed tool block: a `[TOOL:tool_name]` header followed by a fenced
//! JSON body. The single-fence alternative (a fence tagged `tool:name`
//! wrapping the JSON inline) is also accepted. A block that fails to parse
//! degrades to prose; nothing at or after the sentinel of a successfully
//! parsed block is ever forwarded.

use maeum_core::ToolCall;
use tracing::debug;

const BRACKET_SENTINEL: &str = "[TOOL:";
const FENCE_SENTINEL: &str = "```tool:";
const FENCE: &str = "```";

#[derive(Clone, Debug)]
pub enum ScanEvent {
    /// Visible prose to forward to the UI.
    Prose(String),
    /// A parsed tool call; the stream should be aborted upstream.
    Tool(ToolCall),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SentinelKind {
    Bracket,
    Fence,
}

#[derive(Clone, Copy)]
enum Mode {
    Scanning,
    Collecting { kind: SentinelKind, start: usize },
    Done,
}

enum Parse {
    NeedMore,
    Parsed {
        name: String,
        input: serde_json::Value,
        consumed: usize,
    },
    Failed {
        consumed: usize,
    },
}

pub struct StreamInterceptor {
    buffer: String,
    forwarded: usize,
    mode: Mode,
}

impl Default for StreamInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamInterceptor {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            forwarded: 0,
            mode: Mode::Scanning,
        }
    }

    /// Whether a tool block has been parsed; further input is discarded.
    pub fn intercepted(&self) -> bool {
        matches!(self.mode, Mode::Done)
    }

    /// Feed one chunk; returns the events it produced.
    pub fn push(&mut self, chunk: &str) -> Vec<ScanEvent> {
        if self.intercepted() {
            return Vec::new();
        }
        self.buffer.push_str(chunk);
        self.drain(false)
    }

    /// Stream ended: flush anything still held back. An unterminated tool
    /// block degrades to prose.
    pub fn finish(&mut self) -> Vec<ScanEvent> {
        self.drain(true)
    }

    fn drain(&mut self, at_end: bool) -> Vec<ScanEvent> {
        let mut events = Vec::new();

        loop {
            match self.mode {
                Mode::Done => break,
                Mode::Scanning => {
                    let window = &self.buffer[self.forwarded..];
                    match find_sentinel(window) {
                        Some((offset, kind)) => {
                            if offset > 0 {
                                events.push(ScanEvent::Prose(
                                    window[..offset].to_string(),
                                ));
                            }
                            let start = self.forwarded + offset;
                            self.forwarded = start;
                            self.mode = Mode::Collecting { kind, start };
                        }
                        None => {
                            let holdback = if at_end { 0 } else { prefix_holdback(window) };
                            let emit_to = window.len() - holdback;
                            if emit_to > 0 {
                                events.push(ScanEvent::Prose(window[..emit_to].to_string()));
                                self.forwarded += emit_to;
                            }
                            break;
                        }
                    }
                }
                Mode::Collecting { kind, start } => {
                    let window = &self.buffer[start..];
                    match try_parse(window, kind) {
                        Parse::NeedMore => {
                            if at_end {
                                // Unfinished block: everything becomes prose.
                                events.push(ScanEvent::Prose(window.to_string()));
                                self.forwarded = self.buffer.len();
                                self.mode = Mode::Scanning;
                            }
                            break;
                        }
                        Parse::Parsed {
                            name,
                            input,
                            consumed,
                        } => {
                            debug!("tool block intercepted: {}", name);
                            let mut call = ToolCall::new(name, input);
                            call.source_span = (start, start + consumed);
                            events.push(ScanEvent::Tool(call));
                            self.mode = Mode::Done;
                            break;
                        }
                        Parse::Failed { consumed } => {
                            // Malformed block: what we collected is prose.
                            events.push(ScanEvent::Prose(window[..consumed].to_string()));
                            self.forwarded = start + consumed;
                            self.mode = Mode::Scanning;
                        }
                    }
                }
            }
        }

        events
    }
}

/// Earliest sentinel occurrence in the window.
fn find_sentinel(window: &str) -> Option<(usize, SentinelKind)> {
    let bracket = window.find(BRACKET_SENTINEL);
    let fence = window.find(FENCE_SENTINEL);
    match (bracket, fence) {
        (Some(b), Some(f)) if f < b => Some((f, SentinelKind::Fence)),
        (Some(b), _) => Some((b, SentinelKind::Bracket)),
        (None, Some(f)) => Some((f, SentinelKind::Fence)),
        (None, None) => None,
    }
}

/// How many trailing bytes of the window could be the beginning of a
/// sentinel split across chunks. Those bytes are held back from the UI.
fn prefix_holdback(window: &str) -> usize {
    let mut holdback = 0;
    for sentinel in [BRACKET_SENTINEL, FENCE_SENTINEL] {
        for k in (1..sentinel.len()).rev() {
            if k <= window.len() && window.ends_with(&sentinel[..k]) {
                holdback = holdback.max(k);
                break;
            }
        }
    }
    holdback
}

fn try_parse(window: &str, kind: SentinelKind) -> Parse {
    match kind {
        SentinelKind::Bracket => parse_bracket(window),
        SentinelKind::Fence => parse_fence(window),
    }
}

/// `[TOOL:name]` followed by a fenced JSON body.
fn parse_bracket(window: &str) -> Parse {
    let after = &window[BRACKET_SENTINEL.len()..];
    let rb = match after.find(']') {
        Some(i) => i,
        None => {
            // A newline before the closing bracket means this was never a
            // tool header.
            return match after.find('\n') {
                Some(nl) => Parse::Failed {
                    consumed: BRACKET_SENTINEL.len() + nl,
                },
                None => Parse::NeedMore,
            };
        }
    };
    let name = after[..rb].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Parse::Failed {
            consumed: BRACKET_SENTINEL.len() + rb + 1,
        };
    }

    let rest_start = BRACKET_SENTINEL.len() + rb + 1;
    let rest = &window[rest_start..];
    let f1 = match rest.find(FENCE) {
        Some(i) => i,
        None => return Parse::NeedMore,
    };
    // Body begins after the opening fence's line. Only a bare or `json` tag
    // is a tool block; anything else (e.g. a nested `tool:` fence) is a
    // mixed form and gets rejected rather than guessed at.
    let after_f1 = f1 + FENCE.len();
    let (tag, body_start) = match rest[after_f1..].find('\n') {
        Some(nl) => (rest[after_f1..after_f1 + nl].trim(), after_f1 + nl + 1),
        None => return Parse::NeedMore,
    };
    if !tag.is_empty() && tag != "json" {
        return Parse::Failed {
            consumed: rest_start + body_start,
        };
    }
    let f2 = match rest[body_start..].find(FENCE) {
        Some(i) => body_start + i,
        None => return Parse::NeedMore,
    };

    let body = &rest[body_start..f2];
    let consumed = rest_start + f2 + FENCE.len();
    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(input) if input.is_object() => Parse::Parsed {
            name: name.to_string(),
            input,
            consumed,
        },
        _ => Parse::Failed { consumed },
    }
}

/// ```` ```tool:name { ... }``` ```` single-fence form.
fn parse_fence(window: &str) -> Parse {
    let after = &window[FENCE_SENTINEL.len()..];
    let name_end = match after.find(|c: char| c.is_whitespace()) {
        Some(i) => i,
        None => return Parse::NeedMore,
    };
    let name = &after[..name_end];
    if name.is_empty() {
        return Parse::Failed {
            consumed: FENCE_SENTINEL.len(),
        };
    }
    let close = match after[name_end..].find(FENCE) {
        Some(i) => name_end + i,
        None => return Parse::NeedMore,
    };

    let body = after[name_end..close].trim();
    let consumed = FENCE_SENTINEL.len() + close + FENCE.len();
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(input) if input.is_object() => Parse::Parsed {
            name: name.to_string(),
            input,
            consumed,
        },
        _ => Parse::Failed { consumed },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_prose(events: &[ScanEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Prose(p) => Some(p.as_str()),
                _ => None,
            })
            .collect()
    }

    fn find_tool(events: &[ScanEvent]) -> Option<&ToolCall> {
        events.iter().find_map(|e| match e {
            ScanEvent::Tool(t) => Some(t),
            _ => None,
        })
    }

    #[test]
    fn plain_prose_passes_through() {
        let mut interceptor = StreamInterceptor::new();
        let mut events = interceptor.push("Just thinking out loud. ");
        events.extend(interceptor.push("No tools needed."));
        events.extend(interceptor.finish());
        assert!(find_tool(&events).is_none());
        assert_eq!(
            collect_prose(&events),
            "Just thinking out loud. No tools needed."
        );
    }

    #[test]
    fn mid_stream_interception_discards_tail() {
        let mut interceptor = StreamInterceptor::new();
        let mut events = Vec::new();
        events.extend(interceptor.push("I will read "));
        events.extend(interceptor.push("that. "));
        events.extend(
            interceptor.push("[TOOL:read_file]\n```json\n{\"file_path\":\"x.py\"}\n```"),
        );
        events.extend(interceptor.push(" ignored tail"));
        events.extend(interceptor.finish());

        assert_eq!(collect_prose(&events), "I will read that. ");
        let tool = find_tool(&events).unwrap();
        assert_eq!(tool.name, "read_file");
        assert_eq!(tool.input["file_path"], "x.py");
        assert!(interceptor.intercepted());
    }

    #[test]
    fn sentinel_split_across_chunks() {
        let mut interceptor = StreamInterceptor::new();
        let mut events = Vec::new();
        events.extend(interceptor.push("prose [TO"));
        events.extend(interceptor.push("OL:grep]\n```json\n"));
        events.extend(interceptor.push("{\"pattern\":\"x\"}\n```"));
        events.extend(interceptor.finish());

        assert_eq!(collect_prose(&events), "prose ");
        assert_eq!(find_tool(&events).unwrap().name, "grep");
    }

    #[test]
    fn no_prose_at_or_after_sentinel() {
        let mut interceptor = StreamInterceptor::new();
        let raw = "before[TOOL:glob]\n```json\n{\"pattern\":\"*.py\"}\n```after";
        let mut events = interceptor.push(raw);
        events.extend(interceptor.finish());
        let prose = collect_prose(&events);
        assert_eq!(prose, "before");
        assert!(!prose.contains("[TOOL:"));
    }

    #[test]
    fn parse_failure_degrades_to_prose() {
        let mut interceptor = StreamInterceptor::new();
        let raw = "try this: [TOOL:edit_file]\n```json\n{not valid json}\n``` and move on";
        let mut events = interceptor.push(raw);
        events.extend(interceptor.finish());
        assert!(find_tool(&events).is_none());
        let prose = collect_prose(&events);
        assert!(prose.contains("[TOOL:edit_file]"));
        assert!(prose.contains("and move on"));
    }

    #[test]
    fn unterminated_block_flushes_at_end() {
        let mut interceptor = StreamInterceptor::new();
        let mut events = interceptor.push("text [TOOL:read_file]\n```json\n{\"file_path\":");
        events.extend(interceptor.finish());
        assert!(find_tool(&events).is_none());
        assert!(collect_prose(&events).contains("[TOOL:read_file]"));
    }

    #[test]
    fn fence_form_is_recognized() {
        let mut interceptor = StreamInterceptor::new();
        let mut events = interceptor.push("```tool:bash {\"command\":\"ls\"}```");
        events.extend(interceptor.finish());
        let tool = find_tool(&events).unwrap();
        assert_eq!(tool.name, "bash");
        assert_eq!(tool.input["command"], "ls");
    }

    #[test]
    fn mixed_form_is_rejected_not_guessed() {
        let mut interceptor = StreamInterceptor::new();
        // Bracket header whose fence carries a tool: tag instead of JSON.
        let raw = "[TOOL:bash]\n```tool:bash\n{\"command\":\"ls\"}\n```";
        let mut events = interceptor.push(raw);
        events.extend(interceptor.finish());
        assert!(find_tool(&events).is_none());
    }

    #[test]
    fn second_block_after_failed_first() {
        let mut interceptor = StreamInterceptor::new();
        let raw = "[TOOL:bad]\n```json\nnope\n``` then [TOOL:glob]\n```json\n{\"pattern\":\"*\"}\n```";
        let mut events = interceptor.push(raw);
        events.extend(interceptor.finish());
        let tool = find_tool(&events).unwrap();
        assert_eq!(tool.name, "glob");
    }

    #[test]
    fn source_span_covers_the_block() {
        let mut interceptor = StreamInterceptor::new();
        let prefix = "abc ";
        let block = "[TOOL:grep]\n```json\n{\"pattern\":\"q\"}\n```";
        let events = interceptor.push(&format!("{}{}", prefix, block));
        let tool = find_tool(&events).unwrap();
        assert_eq!(tool.source_span.0, prefix.len());
        assert_eq!(tool.source_span.1, prefix.len() + block.len());
    }
}

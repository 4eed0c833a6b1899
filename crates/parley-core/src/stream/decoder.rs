//! Incremental decoder for `data: ` event streams
//!
//! Turns arbitrarily sliced response chunks into an ordered sequence of
//! [`DecodeEvent`]s, carrying partial lines and split characters across calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::utf8::Utf8Carry;

/// Prefix marking a line as an event record
pub const DATA_PREFIX: &str = "data: ";

/// Payload signalling that no further records follow
pub const DONE_SENTINEL: &str = "[DONE]";

/// `status` value the backend attaches to error payloads
pub const ERROR_STATUS: &str = "error";

/// Events decoded from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Incremental content and/or the conversation id
    Delta {
        content: Option<String>,
        conversation_id: Option<String>,
        status: Option<String>,
    },

    /// `[DONE]` was received
    Done,

    /// The record carried the marker but its payload was not JSON
    Malformed { raw: String, error: String },
}

impl DecodeEvent {
    /// A delta the backend flagged as an error report
    pub fn is_error_delta(&self) -> bool {
        matches!(
            self,
            DecodeEvent::Delta { status: Some(status), .. } if status == ERROR_STATUS
        )
    }
}

/// What to do with a trailing partial line when the transport ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Drop it; a record without a newline is incomplete
    #[default]
    Discard,
    /// Treat it as if a newline had followed
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Open,
    Closed,
}

/// Counters for logging and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub bytes_received: usize,
    pub records: usize,
    pub events: usize,
    pub ignored_bytes: usize,
}

/// Line-buffered decoder for one response body
pub struct StreamDecoder {
    /// Text after the last newline, waiting for more chunks
    buffer: String,
    utf8: Utf8Carry,
    tail_policy: TailPolicy,
    state: DecoderState,
    stream_start: Instant,
    stats: DecoderStats,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_tail_policy(TailPolicy::default())
    }

    pub fn with_tail_policy(tail_policy: TailPolicy) -> Self {
        Self {
            buffer: String::new(),
            utf8: Utf8Carry::new(),
            tail_policy,
            state: DecoderState::Open,
            stream_start: Instant::now(),
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == DecoderState::Closed
    }

    /// The partial line held for the next chunk
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn tail_policy(&self) -> TailPolicy {
        self.tail_policy
    }

    /// Feed one chunk from the transport and return the events it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        if self.is_closed() {
            self.ignore(chunk);
            return Vec::new();
        }

        self.stats.bytes_received += chunk.len();
        self.utf8.decode(chunk, &mut self.buffer);
        debug!(
            "Stream chunk received: {} bytes (total: {} bytes)",
            chunk.len(),
            self.stats.bytes_received
        );

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        // Everything up to the last newline is complete; the rest stays buffered
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        let mut events = Vec::new();
        for line in complete[..last_newline].split('\n') {
            match self.process_line(line) {
                Some(DecodeEvent::Done) => {
                    events.push(DecodeEvent::Done);
                    self.close();
                    break;
                }
                Some(event) => events.push(event),
                None => {}
            }
        }

        self.stats.events += events.len();
        events
    }

    /// The transport has ended; apply the tail policy and close
    pub fn finish(&mut self) -> Vec<DecodeEvent> {
        if self.is_closed() {
            return Vec::new();
        }

        self.utf8.flush(&mut self.buffer);
        let tail = std::mem::take(&mut self.buffer);

        let mut events = Vec::new();
        if !tail.is_empty() {
            match self.tail_policy {
                TailPolicy::Discard => {
                    warn!(
                        "Stream ended mid-record, discarding {} bytes: {}",
                        tail.len(),
                        tail
                    );
                }
                TailPolicy::Process => {
                    debug!("Stream ended mid-record, processing {} byte tail", tail.len());
                    events.extend(self.process_line(&tail));
                }
            }
        }

        self.stats.events += events.len();
        self.close();
        events
    }

    fn process_line(&mut self, line: &str) -> Option<DecodeEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return None;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            debug!("Ignoring non-data line: {} chars", line.len());
            return None;
        };

        self.stats.records += 1;
        if payload == DONE_SENTINEL {
            return Some(DecodeEvent::Done);
        }

        let event = parse_payload(payload);
        if let Some(DecodeEvent::Malformed { error, .. }) = &event {
            warn!(
                "Failed to parse stream JSON (record #{}): {} ({})",
                self.stats.records, payload, error
            );
        }
        event
    }

    fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = DecoderState::Closed;
        self.buffer.clear();
        self.utf8.reset();
        info!(
            "Stream decoder closed after {:?}: {} records, {} events, {} bytes",
            self.stream_start.elapsed(),
            self.stats.records,
            self.stats.events,
            self.stats.bytes_received
        );
    }

    fn ignore(&mut self, chunk: &[u8]) {
        self.stats.ignored_bytes += chunk.len();
        if chunk.iter().all(u8::is_ascii_whitespace) {
            debug!("Ignoring {} whitespace bytes after stream end", chunk.len());
        } else {
            warn!(
                "Stream decoder is closed, ignoring {} bytes ({} ignored so far)",
                chunk.len(),
                self.stats.ignored_bytes
            );
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one payload; `None` means valid JSON with nothing to report
fn parse_payload(payload: &str) -> Option<DecodeEvent> {
    match serde_json::from_str::<Value>(payload) {
        Ok(json) => {
            let content = string_field(&json, "content");
            let conversation_id = string_field(&json, "conversation_id");
            if content.is_none() && conversation_id.is_none() {
                debug!("Skipping payload without content or conversation id");
                return None;
            }
            Some(DecodeEvent::Delta {
                content,
                conversation_id,
                status: string_field(&json, "status"),
            })
        }
        Err(e) => Some(DecodeEvent::Malformed {
            raw: payload.to_string(),
            error: e.to_string(),
        }),
    }
}

/// Non-empty string field; anything else counts as absent
fn string_field(json: &Value, name: &str) -> Option<String> {
    json.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> DecodeEvent {
        DecodeEvent::Delta {
            content: Some(content.to_string()),
            conversation_id: None,
            status: None,
        }
    }

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<DecodeEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    const RESPONSE: &str = concat!(
        "data: {\"content\": \"Here is\", \"conversation_id\": \"c-1\", \"status\": \"streaming\"}\n\n",
        ": keep-alive\n",
        "data: {\"content\": \" the fix: café ☕\", \"conversation_id\": \"c-1\"}\n\n",
        "data: {not json}\n\n",
        "data: {\"status\": \"streaming\"}\n\n",
        "event: ping\n",
        "data: {\"content\": \" done 🦀\"}\n\n",
        "data: [DONE]\n\n",
        "data: {\"content\": \"after done\"}\n\n",
    );

    #[test]
    fn test_partial_line_buffering() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"data: {\"content\":\"a").is_empty());
        assert_eq!(decoder.pending(), "data: {\"content\":\"a");

        let events = decoder.feed(b"bc\"}\n");
        assert_eq!(events, vec![delta("abc")]);
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn test_termination_stops_emission() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: [DONE]\ndata: {\"content\":\"x\"}\n");
        assert_eq!(events, vec![DecodeEvent::Done]);
        assert!(decoder.is_closed());
    }

    #[test]
    fn test_malformed_resilience() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {not json}\ndata: {\"content\":\"ok\"}\n");
        assert_eq!(events.len(), 2);
        match &events[0] {
            DecodeEvent::Malformed { raw, error } => {
                assert_eq!(raw, "{not json}");
                assert!(!error.is_empty());
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
        assert_eq!(events[1], delta("ok"));
    }

    #[test]
    fn test_split_boundary_idempotence() {
        let bytes = RESPONSE.as_bytes();
        let whole = decode_chunks(&[bytes]);

        // Every two-way split, including splits inside multi-byte characters
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_chunks(&[a, b]), whole, "split at byte {}", split);
        }

        // One byte at a time
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_chunks(&singles), whole);
    }

    #[test]
    fn test_order_preservation() {
        let events = decode_chunks(&[RESPONSE.as_bytes()]);
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            DecodeEvent::Delta {
                content: Some("Here is".to_string()),
                conversation_id: Some("c-1".to_string()),
                status: Some("streaming".to_string()),
            }
        );
        assert_eq!(
            events[1],
            DecodeEvent::Delta {
                content: Some(" the fix: café ☕".to_string()),
                conversation_id: Some("c-1".to_string()),
                status: None,
            }
        );
        assert!(matches!(events[2], DecodeEvent::Malformed { .. }));
        assert_eq!(events[3], delta(" done 🦀"));
        assert_eq!(events[4], DecodeEvent::Done);
    }

    #[test]
    fn test_metadata_only_payload_skipped() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b"data: {\"status\":\"streaming\"}\ndata: {\"content\":\"\",\"conversation_id\":\"\"}\ndata: 42\ndata: {\"content\":\"x\"}\n",
        );
        assert_eq!(events, vec![delta("x")]);
        assert_eq!(decoder.stats().records, 4);
    }

    #[test]
    fn test_conversation_id_only_delta() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {\"conversation_id\":\"abc123\",\"content\":7}\n");
        assert_eq!(
            events,
            vec![DecodeEvent::Delta {
                content: None,
                conversation_id: Some("abc123".to_string()),
                status: None,
            }]
        );
    }

    #[test]
    fn test_ignorable_lines() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"\n\n: comment\nevent: message\ndata:{\"content\":\"no space\"}\n");
        assert!(events.is_empty());
        assert_eq!(decoder.stats().records, 0);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {\"content\":\"a\"}\r\n\r\ndata: [DONE]\r\n");
        assert_eq!(events, vec![delta("a"), DecodeEvent::Done]);
    }

    #[test]
    fn test_sentinel_is_exact() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: [done]\ndata:  [DONE]\n");
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, DecodeEvent::Malformed { .. })));
        assert!(!decoder.is_closed());
    }

    #[test]
    fn test_finish_discards_tail_by_default() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert!(decoder.finish().is_empty());
        assert!(decoder.is_closed());
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn test_finish_processes_tail_when_configured() {
        let mut decoder = StreamDecoder::with_tail_policy(TailPolicy::Process);
        assert!(decoder.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![delta("tail")]);
        assert!(decoder.is_closed());
    }

    #[test]
    fn test_finish_processes_done_tail() {
        let mut decoder = StreamDecoder::with_tail_policy(TailPolicy::Process);
        decoder.feed(b"data: [DONE]");
        assert_eq!(decoder.finish(), vec![DecodeEvent::Done]);
    }

    #[test]
    fn test_input_after_close_is_ignored() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(b"data: [DONE]\n"), vec![DecodeEvent::Done]);

        assert!(decoder.feed(b"data: {\"content\":\"late\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
        assert_eq!(decoder.stats().ignored_bytes, 25);
        assert_eq!(decoder.state(), DecoderState::Closed);
    }

    #[test]
    fn test_split_multibyte_character_in_content() {
        let text = "data: {\"content\":\"naïve\"}\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&text[..split]).is_empty());
        assert!(!decoder.pending().contains('\u{FFFD}'));
        assert_eq!(decoder.feed(&text[split..]), vec![delta("naïve")]);
    }

    #[test]
    fn test_empty_chunks() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"").is_empty());
        decoder.feed(b"data: {\"content\":\"x\"}");
        assert!(decoder.feed(b"").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![delta("x")]);
    }

    #[test]
    fn test_error_delta() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {\"content\":\"Error: boom\",\"status\":\"error\"}\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error_delta());
        assert!(!delta("fine").is_error_delta());
    }

    #[test]
    fn test_tail_policy_serde() {
        let policy: TailPolicy = serde_json::from_str("\"process\"").unwrap();
        assert_eq!(policy, TailPolicy::Process);
    }
}

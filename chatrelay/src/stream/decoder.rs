// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// SSE frame decoder
//
// Reassembles `data:` records from arbitrarily fragmented chunks and
// parses each payload as JSON. The carry-over buffer holds raw bytes
// and lives for the whole stream: a record is only decoded once its
// separator has arrived, so neither a split separator nor a split
// multi-byte character can lose data.

use super::types::{AgentEvent, DecoderStats, SseRecord, DONE_SENTINEL};
use bytes::{Buf, Bytes, BytesMut};

/// Maximum payload characters echoed into a parse-failure log line.
const LOG_SNIPPET_CHARS: usize = 200;

/// Default cap on bytes buffered for one record: 1 MiB.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Longest separator minus one: bytes that may begin a separator
/// completed by the next chunk.
const SEPARATOR_OVERLAP: usize = 3;

/// Errors for a single record. Never fatal to the stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("record payload is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },
}

/// Incremental SSE decoder. One instance per stream.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Offset up to which `buffer` is known to hold no separator.
    scanned: usize,
    /// `None` buffers records of any size.
    max_record_bytes: Option<usize>,
    /// Set while skipping the rest of an oversized record.
    discarding: bool,
    stats: DecoderStats,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_record_bytes: Some(DEFAULT_MAX_RECORD_BYTES),
            discarding: false,
            stats: DecoderStats::default(),
        }
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_record_bytes(mut self, max: Option<usize>) -> Self {
        self.max_record_bytes = max;
        self
    }

    /// Append a chunk and return every event completed by it, in order.
    ///
    /// Malformed records are logged and skipped; they never surface here.
    /// A record that outgrows the size cap before its separator arrives is
    /// dropped whole.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.discarding && !self.skip_oversized() {
                break;
            }
            let Some(raw) = self.next_record() else {
                self.enforce_record_limit();
                break;
            };
            if let Some(event) = self.decode_record(&raw) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes held back waiting for a separator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Close the stream. Any unterminated trailing record is discarded.
    pub fn finish(mut self) -> DecoderStats {
        if !self.buffer.is_empty() {
            self.stats.discarded_tail_bytes = self.buffer.len();
            tracing::debug!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing record"
            );
            self.buffer.clear();
        }
        self.stats
    }

    /// Split the next complete record off the front of the buffer.
    fn next_record(&mut self) -> Option<Bytes> {
        // A separator may straddle the previous scan end; back up enough
        // to catch the longest one.
        let from = self.scanned.saturating_sub(SEPARATOR_OVERLAP);
        match find_record_boundary(&self.buffer[from..]) {
            Some((pos, sep_len)) => {
                let record = self.buffer.split_to(from + pos).freeze();
                self.buffer.advance(sep_len);
                self.scanned = 0;
                self.stats.records += 1;
                Some(record)
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Start discarding the pending record once it exceeds the cap.
    fn enforce_record_limit(&mut self) {
        let Some(max) = self.max_record_bytes else {
            return;
        };
        if self.buffer.len() <= max {
            return;
        }
        self.stats.oversized_records += 1;
        tracing::warn!(
            buffered_bytes = self.buffer.len(),
            max_record_bytes = max,
            "SSE record exceeds size cap; dropping it"
        );
        self.discarding = true;
        self.keep_separator_overlap();
    }

    /// Drop bytes of an oversized record up to and including its
    /// separator. Returns false while the separator has not arrived.
    fn skip_oversized(&mut self) -> bool {
        match find_record_boundary(&self.buffer) {
            Some((pos, sep_len)) => {
                self.buffer.advance(pos + sep_len);
                self.scanned = 0;
                self.discarding = false;
                true
            }
            None => {
                self.keep_separator_overlap();
                false
            }
        }
    }

    fn keep_separator_overlap(&mut self) {
        let excess = self.buffer.len().saturating_sub(SEPARATOR_OVERLAP);
        self.buffer.advance(excess);
        self.scanned = 0;
    }

    fn decode_record(&mut self, raw: &[u8]) -> Option<AgentEvent> {
        let text = String::from_utf8_lossy(raw);
        let record = match parse_record(&text) {
            Some(r) => r,
            None => {
                self.stats.skipped += 1;
                return None;
            }
        };

        match parse_payload(&record) {
            Ok(Some(event)) => {
                self.stats.events += 1;
                tracing::debug!(payload = %event.payload, "decoded agent event");
                Some(event)
            }
            Ok(None) => {
                self.stats.ignored += 1;
                None
            }
            Err(DecodeError::InvalidJson { source, snippet }) => {
                self.stats.parse_failures += 1;
                tracing::warn!(
                    error = %source,
                    payload = %snippet,
                    "failed to parse SSE record; dropping it"
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record parsing
// ---------------------------------------------------------------------------

/// Parse one raw record into an `SseRecord`.
///
/// Returns `None` unless the record starts (after leading whitespace) with
/// `data:`. Every `data:` line contributes its value, trimmed; other lines
/// (`event:`, `id:`, comments) are ignored.
pub fn parse_record(raw: &str) -> Option<SseRecord> {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("data:") {
        return None;
    }

    let data = trimmed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    Some(SseRecord { data })
}

/// Parse a record payload as JSON.
///
/// `Ok(None)` for empty payloads and the `[DONE]` terminator.
pub fn parse_payload(record: &SseRecord) -> Result<Option<AgentEvent>, DecodeError> {
    let data = record.data.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return Ok(None);
    }

    serde_json::from_str(data)
        .map(|payload| Some(AgentEvent::new(payload)))
        .map_err(|source| DecodeError::InvalidJson {
            source,
            snippet: data.chars().take(LOG_SNIPPET_CHARS).collect(),
        })
}

/// Find the earliest record separator, `\n\n` or `\r\n\r\n`.
///
/// Returns the separator's offset and length.
fn find_record_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(events: &[AgentEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.payload["content"]["parts"][0]["text"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn single_chunk_with_two_records() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b"data: {\"content\":{\"parts\":[{\"text\":\"a\"}]}}\n\ndata: {\"content\":{\"parts\":[{\"text\":\"b\"}]}}\n\n",
        );
        assert_eq!(texts(&events), vec!["a", "b"]);
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.stats().records, 2);
    }

    #[test]
    fn incomplete_record_is_carried_over() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"x\":").is_empty());
        assert_eq!(decoder.pending_bytes(), 11);
        let events = decoder.push(b"1}\n\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
    }

    #[test]
    fn separator_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"x\":1}\n").is_empty());
        let events = decoder.push(b"\ndata: {\"x\":2}\n\n");
        assert_eq!(
            events,
            vec![AgentEvent::new(json!({"x": 1})), AgentEvent::new(json!({"x": 2}))]
        );
    }

    #[test]
    fn marker_split_mid_word() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"dat").is_empty());
        let events = decoder.push(b"a: {\"x\":1}\n\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let record = "data: {\"t\":\"h\u{e9}llo \u{1f600}\"}\n\n".as_bytes().to_vec();
        // Split inside the 4-byte emoji.
        let emoji_start = record.iter().position(|b| *b == 0xF0).unwrap();
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&record[..emoji_start + 2]).is_empty());
        let events = decoder.push(&record[emoji_start + 2..]);
        assert_eq!(events, vec![AgentEvent::new(json!({"t": "h\u{e9}llo \u{1f600}"}))]);
    }

    #[test]
    fn crlf_separators_are_accepted() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"x\":1}\r\n\r\ndata: {\"x\":2}\r\n\r");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
        let events = decoder.push(b"\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 2}))]);
    }

    #[test]
    fn non_data_records_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: ping\n\n\n\ndata: {\"x\":1}\n\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
        assert_eq!(decoder.stats().skipped, 3);
    }

    #[test]
    fn malformed_record_does_not_affect_following_records() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {not json\n\ndata: {\"x\":1}\n\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
        assert_eq!(decoder.stats().parse_failures, 1);
    }

    #[test]
    fn done_and_empty_payloads_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: [DONE]\n\ndata:\n\n");
        assert!(events.is_empty());
        assert_eq!(decoder.stats().ignored, 2);
        assert_eq!(decoder.stats().parse_failures, 0);
    }

    #[test]
    fn trailing_record_without_separator_is_discarded() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"x\":1}\n\ndata: {\"x\":2}");
        assert_eq!(events.len(), 1);
        let stats = decoder.finish();
        assert_eq!(stats.discarded_tail_bytes, 13);
        assert_eq!(stats.events, 1);
    }

    #[test]
    fn oversized_record_is_dropped_and_stream_continues() {
        let mut decoder = SseDecoder::new().with_max_record_bytes(Some(16));
        assert!(decoder.push(b"data: {\"x\":\"aaaaaaaaaaaaaaaaaaaa").is_empty());
        assert_eq!(decoder.stats().oversized_records, 1);
        assert!(decoder.pending_bytes() <= 3);

        assert!(decoder.push(b"aaaaaaaaaaaaaaaa").is_empty());
        assert!(decoder.pending_bytes() <= 3);

        let events = decoder.push(b"aa\"}\n\ndata: {\"x\":1}\n\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 1}))]);
        assert_eq!(decoder.stats().oversized_records, 1);
        assert_eq!(decoder.stats().parse_failures, 0);
        assert_eq!(decoder.stats().events, 1);
    }

    #[test]
    fn oversized_record_separator_split_across_chunks() {
        let mut decoder = SseDecoder::new().with_max_record_bytes(Some(8));
        assert!(decoder.push(b"data: {\"x\":\"long value\"}\r\n\r").is_empty());
        let events = decoder.push(b"\ndata: {\"x\":2}\r\n\r\n");
        assert_eq!(events, vec![AgentEvent::new(json!({"x": 2}))]);
    }

    #[test]
    fn complete_records_in_one_chunk_ignore_the_cap() {
        let mut decoder = SseDecoder::new().with_max_record_bytes(Some(8));
        let events = decoder.push(b"data: {\"x\":\"longer than eight\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(decoder.stats().oversized_records, 0);
    }

    #[test]
    fn no_cap_buffers_any_size() {
        let mut decoder = SseDecoder::new().with_max_record_bytes(None);
        let big = format!("data: {{\"x\":\"{}\"}}", "a".repeat(4096));
        assert!(decoder.push(big.as_bytes()).is_empty());
        assert_eq!(decoder.pending_bytes(), big.len());
        assert_eq!(decoder.push(b"\n\n").len(), 1);
    }

    #[test]
    fn multi_line_data_record_is_joined() {
        let record = parse_record("data: {\"a\":\ndata: 1}").unwrap();
        assert_eq!(record.data, "{\"a\":\n1}");
        let event = parse_payload(&record).unwrap().unwrap();
        assert_eq!(event.payload, json!({"a": 1}));
    }

    #[test]
    fn parse_record_strips_marker_and_whitespace() {
        let record = parse_record("  data:   {\"a\":1}  ").unwrap();
        assert_eq!(record.data, "{\"a\":1}");
        assert!(parse_record("event: message").is_none());
        assert!(parse_record("").is_none());
    }

    #[test]
    fn byte_at_a_time_feed_matches_single_feed() {
        let input = b"data: {\"x\":1}\n\n: comment\n\ndata: {\"x\":2}\n\n";
        let mut whole = SseDecoder::new();
        let expected = whole.push(input);

        let mut split = SseDecoder::new();
        let mut actual = Vec::new();
        for byte in input.iter() {
            actual.extend(split.push(std::slice::from_ref(byte)));
        }
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 2);
    }
}

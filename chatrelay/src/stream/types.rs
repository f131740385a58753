// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Core types shared by the SSE decoder and the frame re-encoder:
// records, decoded agent events, classification results, per-turn
// state, and per-stream counters.

use serde_json::Value;

// ---------------------------------------------------------------------------
// SSE record / agent event
// ---------------------------------------------------------------------------

/// Payload of a `data: [DONE]` terminator. Not JSON; ignored silently.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One complete SSE data record, with the `data:` marker(s) stripped.
///
/// Multi-line records carry their `data:` lines joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    pub data: String,
}

/// A decoded JSON payload of one SSE data record.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    pub payload: Value,
}

impl AgentEvent {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// What an agent event means to the downstream consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Non-empty conversational text. `partial` is the event's partial
    /// indicator: `Some(true)` for an increment, `Some(false)` or `None`
    /// for a finalized restatement.
    Text { text: String, partial: Option<bool> },
    /// Structured payload forwarded unchanged.
    Annotation(Annotation),
    /// Anything else. Dropped without failing the stream.
    Unrecognized,
}

/// A structured, non-text payload (sources, table, artifact, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// The whole event object, including its `type` discriminator.
    pub payload: Value,
}

/// Annotation discriminator. Only used for logging and allow-listing;
/// the payload is opaque to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    Sources,
    Table,
    Artifact,
    Wiki,
    Image,
    Other(String),
}

impl AnnotationKind {
    pub fn from_type(type_name: &str) -> Self {
        match type_name {
            "sources" => AnnotationKind::Sources,
            "table" => AnnotationKind::Table,
            "artifact" => AnnotationKind::Artifact,
            "wiki" => AnnotationKind::Wiki,
            "image" => AnnotationKind::Image,
            other => AnnotationKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AnnotationKind::Sources => "sources",
            AnnotationKind::Table => "table",
            AnnotationKind::Artifact => "artifact",
            AnnotationKind::Wiki => "wiki",
            AnnotationKind::Image => "image",
            AnnotationKind::Other(name) => name,
        }
    }
}

/// Why a decoded event produced no output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Neither text nor annotation shaped.
    Unrecognized,
    /// Text rejected by the partial policy (e.g. a final restatement).
    PartialPolicy,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Unrecognized => "unrecognized",
            DropReason::PartialPolicy => "partial_policy",
        }
    }
}

// ---------------------------------------------------------------------------
// Turn state
// ---------------------------------------------------------------------------

/// Per-stream state consulted by the partial policy.
///
/// A turn collects the text emitted since the last finalized text event.
/// Frame boundaries are kept so a restatement of only the latest frames
/// is still recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnState {
    emitted: String,
    frame_starts: Vec<usize>,
}

impl TurnState {
    /// Text emitted so far in this turn.
    pub fn emitted_text(&self) -> &str {
        &self.emitted
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    pub fn record_emitted(&mut self, text: &str) {
        self.frame_starts.push(self.emitted.len());
        self.emitted.push_str(text);
    }

    /// True when `text` repeats the turn's emitted text from the start of
    /// one of its frames through the end.
    pub fn is_restatement(&self, text: &str) -> bool {
        !text.is_empty()
            && self
                .frame_starts
                .iter()
                .any(|&start| &self.emitted[start..] == text)
    }

    pub fn close_turn(&mut self) {
        self.emitted.clear();
        self.frame_starts.clear();
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Decoder-side counters for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete records split off the buffer.
    pub records: usize,
    /// Records that were not `data:` records (comments, `event:`, keep-alives).
    pub skipped: usize,
    /// `[DONE]` or empty data records.
    pub ignored: usize,
    /// Data records whose payload failed to parse as JSON.
    pub parse_failures: usize,
    /// Events handed to the re-encoder.
    pub events: usize,
    /// Bytes of an unterminated trailing record discarded at close.
    pub discarded_tail_bytes: usize,
    /// Records dropped for outgrowing the size cap.
    pub oversized_records: usize,
}

/// Re-encoder-side counters for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReEncoderStats {
    pub text_frames: usize,
    pub annotation_frames: usize,
    pub dropped_unrecognized: usize,
    pub dropped_by_policy: usize,
}

impl ReEncoderStats {
    pub fn frames(&self) -> usize {
        self.text_frames + self.annotation_frames
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Unrecognized => self.dropped_unrecognized += 1,
            DropReason::PartialPolicy => self.dropped_by_policy += 1,
        }
    }
}

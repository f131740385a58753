// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// SSE re-framing
//
// Responsibilities:
// - Reassemble SSE `data:` records from arbitrarily fragmented chunks
// - Parse each record as JSON; malformed records are logged and dropped
// - Classify events as text increments, annotations, or unrecognized
// - Deduplicate finalized restatements of streamed text (policy-driven)
// - Emit `0:` text frames and `8:` annotation frames in arrival order
// - Cancel the upstream read when the client disconnects

mod classifier;
mod decoder;
mod encoder;
mod processor;
mod reencoder;
mod types;

pub use classifier::{
    policy_for, AcceptAll, AdkEventClassifier, EventClassifier, PartialPolicy, RequirePartial,
    SkipFinalRestatement,
};
pub use decoder::{
    parse_payload, parse_record, DecodeError, SseDecoder, DEFAULT_MAX_RECORD_BYTES,
};
pub use encoder::{parse_frame, FrameError, OutputFrame, ANNOTATION_PREFIX, TEXT_PREFIX};
pub use processor::{StreamContext, StreamProcessor, DEFAULT_CHANNEL_CAPACITY};
pub use reencoder::ReEncoder;
pub use types::{
    AgentEvent, Annotation, AnnotationKind, DecoderStats, DropReason, EventKind, ReEncoderStats,
    SseRecord, TurnState, DONE_SENTINEL,
};

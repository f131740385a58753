// Stream processor
//
// Takes the backend's SSE byte stream, decodes records, re-encodes
// relevant events as data-stream frames, and produces the response
// byte stream. One task per stream; the bounded channel to the HTTP
// body is the only buffering between upstream and downstream.

use super::classifier::{EventClassifier, PartialPolicy};
use super::decoder::{SseDecoder, DEFAULT_MAX_RECORD_BYTES};
use super::reencoder::ReEncoder;
use bytes::Bytes;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Default capacity of the frame channel between the task and the body.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Logging context for one stream.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    pub request_id: String,
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Upstream finished normally.
    UpstreamClosed,
    /// Upstream transport failed mid-stream.
    UpstreamFailed,
    /// The downstream consumer went away.
    ClientDisconnected,
}

impl StreamEnd {
    fn as_str(&self) -> &'static str {
        match self {
            StreamEnd::UpstreamClosed => "upstream_closed",
            StreamEnd::UpstreamFailed => "upstream_failed",
            StreamEnd::ClientDisconnected => "client_disconnected",
        }
    }
}

/// Re-frames an SSE stream into the line-prefixed data stream.
///
/// Constructed once with the classifier and partial policy; `process`
/// is called once per stream and owns all per-stream state.
pub struct StreamProcessor {
    classifier: Arc<dyn EventClassifier>,
    policy: Arc<dyn PartialPolicy>,
    channel_capacity: usize,
    max_record_bytes: Option<usize>,
}

impl StreamProcessor {
    pub fn new(classifier: Arc<dyn EventClassifier>, policy: Arc<dyn PartialPolicy>) -> Self {
        Self {
            classifier,
            policy,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_record_bytes: Some(DEFAULT_MAX_RECORD_BYTES),
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Cap on bytes buffered for one SSE record. `None` removes the cap.
    pub fn with_max_record_bytes(mut self, max: Option<usize>) -> Self {
        self.max_record_bytes = max;
        self
    }

    /// Process an input byte stream, producing an output byte stream.
    ///
    /// Each item of the output is exactly one encoded frame. An upstream
    /// error ends the output; a record that was only partly received is
    /// never emitted. Dropping the output cancels the upstream read.
    pub fn process<S, E>(&self, mut input: S, ctx: StreamContext) -> ReceiverStream<Bytes>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut reencoder = ReEncoder::new(self.classifier.clone(), self.policy.clone());
        let (tx, rx) = mpsc::channel::<Bytes>(self.channel_capacity);
        let max_record_bytes = self.max_record_bytes;

        tokio::spawn(async move {
            let started = Instant::now();
            let mut decoder = SseDecoder::new().with_max_record_bytes(max_record_bytes);
            let mut chunks = 0usize;

            let end = 'read: loop {
                let next = tokio::select! {
                    biased;
                    _ = tx.closed() => break 'read StreamEnd::ClientDisconnected,
                    next = input.next() => next,
                };

                let chunk = match next {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        tracing::warn!(
                            request_id = %ctx.request_id,
                            error = %e,
                            pending_bytes = decoder.pending_bytes(),
                            "upstream stream failed"
                        );
                        break 'read StreamEnd::UpstreamFailed;
                    }
                    None => break 'read StreamEnd::UpstreamClosed,
                };
                chunks += 1;

                for event in decoder.push(&chunk) {
                    if let Some(frame) = reencoder.handle(&event) {
                        if tx.send(frame.encode()).await.is_err() {
                            break 'read StreamEnd::ClientDisconnected;
                        }
                    }
                }
            };

            // Dropping the input here releases the upstream connection.
            drop(input);

            let decoded = decoder.finish();
            let encoded = reencoder.into_stats();
            tracing::info!(
                request_id = %ctx.request_id,
                end = end.as_str(),
                chunks,
                records = decoded.records,
                events = decoded.events,
                parse_failures = decoded.parse_failures,
                skipped_records = decoded.skipped,
                discarded_tail_bytes = decoded.discarded_tail_bytes,
                oversized_records = decoded.oversized_records,
                text_frames = encoded.text_frames,
                annotation_frames = encoded.annotation_frames,
                dropped_unrecognized = encoded.dropped_unrecognized,
                dropped_by_policy = encoded.dropped_by_policy,
                latency_ms = started.elapsed().as_secs_f64() * 1000.0,
                "stream closed"
            );
        });

        ReceiverStream::new(rx)
    }
}

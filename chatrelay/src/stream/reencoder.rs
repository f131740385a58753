// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use super::classifier::{EventClassifier, PartialPolicy};
use super::encoder::OutputFrame;
use super::types::{AgentEvent, DropReason, EventKind, ReEncoderStats, TurnState};

/// Turns decoded agent events into output frames, one event at a time.
///
/// Holds the per-stream turn state the partial policy needs. Nothing else
/// is remembered between events: feeding the same event twice yields the
/// same decision unless the partial policy says otherwise.
pub struct ReEncoder {
    classifier: Arc<dyn EventClassifier>,
    policy: Arc<dyn PartialPolicy>,
    turn: TurnState,
    stats: ReEncoderStats,
}

impl ReEncoder {
    pub fn new(classifier: Arc<dyn EventClassifier>, policy: Arc<dyn PartialPolicy>) -> Self {
        Self {
            classifier,
            policy,
            turn: TurnState::default(),
            stats: ReEncoderStats::default(),
        }
    }

    pub fn stats(&self) -> &ReEncoderStats {
        &self.stats
    }

    pub fn into_stats(self) -> ReEncoderStats {
        self.stats
    }

    /// Classify one event and return the frame to emit, if any.
    pub fn handle(&mut self, event: &AgentEvent) -> Option<OutputFrame> {
        match self.decide(event) {
            Ok(frame) => {
                match &frame {
                    OutputFrame::Text(_) => self.stats.text_frames += 1,
                    OutputFrame::Annotation(_) => self.stats.annotation_frames += 1,
                }
                tracing::debug!(
                    frame = frame.kind(),
                    bytes = frame.payload_json().len(),
                    "emitting frame"
                );
                Some(frame)
            }
            Err(reason) => {
                self.stats.record_drop(reason);
                tracing::debug!(
                    reason = reason.as_str(),
                    policy = self.policy.name(),
                    "dropping event"
                );
                None
            }
        }
    }

    fn decide(&mut self, event: &AgentEvent) -> Result<OutputFrame, DropReason> {
        match self.classifier.classify(event) {
            EventKind::Text { text, partial } => {
                let emit = self.policy.should_emit(&text, partial, &self.turn);
                match (emit, partial) {
                    // An explicitly final event ends the turn either way.
                    (_, Some(false)) => self.turn.close_turn(),
                    (true, _) => self.turn.record_emitted(&text),
                    (false, Some(true)) => {}
                    (false, None) => self.turn.close_turn(),
                }
                if emit {
                    Ok(OutputFrame::Text(text))
                } else {
                    Err(DropReason::PartialPolicy)
                }
            }
            EventKind::Annotation(annotation) => {
                tracing::debug!(annotation = annotation.kind.as_str(), "annotation event");
                Ok(OutputFrame::Annotation(annotation.payload))
            }
            EventKind::Unrecognized => Err(DropReason::Unrecognized),
        }
    }
}

// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Event classifiers and partial policies
//
// Decide what each decoded agent event means downstream: a text
// increment, an annotation, or nothing. Which text events are emitted
// is a separate, injectable policy, because the backend is not
// consistent about when it sets its partial indicator.

use std::sync::Arc;

use serde_json::Value;

use super::types::{AgentEvent, Annotation, AnnotationKind, EventKind, TurnState};
use crate::config::{PartialPolicyKind, StreamConfig};

// ---------------------------------------------------------------------------
// Trait: EventClassifier
// ---------------------------------------------------------------------------

/// Maps one agent event to its `EventKind`.
///
/// Implementations must be pure: classifying the same event twice yields
/// the same result.
pub trait EventClassifier: Send + Sync {
    fn classify(&self, event: &AgentEvent) -> EventKind;
}

// ---------------------------------------------------------------------------
// ADK classifier
// ---------------------------------------------------------------------------

/// Classifies agent-backend events.
///
/// - `{"content":{"parts":[{"text":"Hi"}]},"partial":true}` -> Text("Hi", Some(true))
/// - `{"type":"sources","data":{...}}` -> Annotation(Sources)
/// - anything else -> Unrecognized
///
/// The text and partial locations are JSON pointers so they can follow
/// backend changes without a code change.
#[derive(Debug, Clone)]
pub struct AdkEventClassifier {
    text_pointer: String,
    partial_pointer: String,
    /// Allowed annotation `type` values. Empty allows any.
    annotation_types: Vec<String>,
}

impl Default for AdkEventClassifier {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl AdkEventClassifier {
    pub fn new(text_pointer: impl Into<String>, partial_pointer: impl Into<String>) -> Self {
        Self {
            text_pointer: text_pointer.into(),
            partial_pointer: partial_pointer.into(),
            annotation_types: Vec::new(),
        }
    }

    pub fn with_annotation_types(mut self, types: Vec<String>) -> Self {
        self.annotation_types = types;
        self
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.text_pointer.clone(), config.partial_pointer.clone())
            .with_annotation_types(config.annotation_types.clone())
    }

    /// Read the partial indicator. Accepts booleans and `"true"`/`"false"`.
    fn partial_flag(&self, payload: &Value) -> Option<bool> {
        match payload.pointer(&self.partial_pointer)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn annotation(&self, payload: &Value) -> Option<Annotation> {
        let object = payload.as_object()?;
        let type_name = object.get("type")?.as_str()?;
        if !object.contains_key("data") {
            return None;
        }
        if !self.annotation_types.is_empty()
            && !self.annotation_types.iter().any(|t| t == type_name)
        {
            return None;
        }
        Some(Annotation {
            kind: AnnotationKind::from_type(type_name),
            payload: payload.clone(),
        })
    }
}

impl EventClassifier for AdkEventClassifier {
    fn classify(&self, event: &AgentEvent) -> EventKind {
        let payload = &event.payload;

        if let Some(text) = payload.pointer(&self.text_pointer).and_then(Value::as_str) {
            if !text.is_empty() {
                return EventKind::Text {
                    text: text.to_string(),
                    partial: self.partial_flag(payload),
                };
            }
        }

        match self.annotation(payload) {
            Some(annotation) => EventKind::Annotation(annotation),
            None => EventKind::Unrecognized,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait: PartialPolicy
// ---------------------------------------------------------------------------

/// Decides whether a text event is emitted, given its text, its partial
/// indicator, and what has been emitted so far in the current turn.
pub trait PartialPolicy: Send + Sync {
    fn should_emit(&self, text: &str, partial: Option<bool>, turn: &TurnState) -> bool;

    fn name(&self) -> &'static str;
}

/// Emit only events explicitly marked `partial: true`.
pub struct RequirePartial;

impl PartialPolicy for RequirePartial {
    fn should_emit(&self, _text: &str, partial: Option<bool>, _turn: &TurnState) -> bool {
        partial == Some(true)
    }

    fn name(&self) -> &'static str {
        "require_partial"
    }
}

/// Emit every text event.
pub struct AcceptAll;

impl PartialPolicy for AcceptAll {
    fn should_emit(&self, _text: &str, _partial: Option<bool>, _turn: &TurnState) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accept_all"
    }
}

/// Emit increments. A text event without `partial: true` is dropped only
/// when it restates text this turn already emitted; anything else is new
/// content, whatever its flag says.
pub struct SkipFinalRestatement;

impl PartialPolicy for SkipFinalRestatement {
    fn should_emit(&self, text: &str, partial: Option<bool>, turn: &TurnState) -> bool {
        partial == Some(true) || !turn.is_restatement(text)
    }

    fn name(&self) -> &'static str {
        "skip_final_restatement"
    }
}

pub fn policy_for(kind: PartialPolicyKind) -> Arc<dyn PartialPolicy> {
    match kind {
        PartialPolicyKind::RequirePartial => Arc::new(RequirePartial),
        PartialPolicyKind::AcceptAll => Arc::new(AcceptAll),
        PartialPolicyKind::SkipFinalRestatement => Arc::new(SkipFinalRestatement),
    }
}

// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Output frames
//
// The downstream data stream is line oriented:
//
//   0:"<json string>"\n       text increment
//   8:[<annotation object>]\n annotation

use bytes::Bytes;
use serde_json::Value;

pub const TEXT_PREFIX: char = '0';
pub const ANNOTATION_PREFIX: char = '8';

/// One line of the downstream protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFrame {
    Text(String),
    Annotation(Value),
}

impl OutputFrame {
    pub fn prefix(&self) -> char {
        match self {
            OutputFrame::Text(_) => TEXT_PREFIX,
            OutputFrame::Annotation(_) => ANNOTATION_PREFIX,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutputFrame::Text(_) => "text",
            OutputFrame::Annotation(_) => "annotation",
        }
    }

    /// Serialize the frame payload as compact JSON.
    pub fn payload_json(&self) -> String {
        match self {
            OutputFrame::Text(text) => Value::from(text.as_str()).to_string(),
            OutputFrame::Annotation(annotation) => format!("[{annotation}]"),
        }
    }

    /// Encode as a complete UTF-8 line, trailing newline included.
    pub fn encode(&self) -> Bytes {
        Bytes::from(format!("{}:{}\n", self.prefix(), self.payload_json()))
    }
}

/// Errors decoding a frame line on the consumer side.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no type prefix")]
    MissingPrefix,

    #[error("unsupported frame prefix \"{0}\"")]
    UnknownPrefix(String),

    #[error("frame payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame payload has the wrong shape: {0}")]
    UnexpectedShape(String),
}

/// Parse one frame line the way the downstream consumer does.
///
/// A trailing newline is tolerated. An annotation frame must carry an
/// array of exactly one object.
pub fn parse_frame(line: &str) -> Result<OutputFrame, FrameError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let (prefix, payload) = line.split_once(':').ok_or(FrameError::MissingPrefix)?;
    let value: Value = serde_json::from_str(payload)?;

    match prefix.chars().next() {
        Some(TEXT_PREFIX) if prefix.len() == 1 => match value {
            Value::String(text) => Ok(OutputFrame::Text(text)),
            other => Err(FrameError::UnexpectedShape(format!(
                "text frame carries {other}"
            ))),
        },
        Some(ANNOTATION_PREFIX) if prefix.len() == 1 => match value {
            Value::Array(mut items) if items.len() == 1 => {
                Ok(OutputFrame::Annotation(items.remove(0)))
            }
            other => Err(FrameError::UnexpectedShape(format!(
                "annotation frame carries {other}"
            ))),
        },
        _ => Err(FrameError::UnknownPrefix(prefix.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_frame_is_json_string_encoded() {
        let frame = OutputFrame::Text("Hi".to_string());
        assert_eq!(frame.encode(), Bytes::from_static(b"0:\"Hi\"\n"));
    }

    #[test]
    fn text_frame_escapes_quotes_and_newlines() {
        let frame = OutputFrame::Text("say \"hi\"\nnow".to_string());
        assert_eq!(frame.encode(), Bytes::from("0:\"say \\\"hi\\\"\\nnow\"\n"));
    }

    #[test]
    fn annotation_frame_wraps_object_in_array() {
        let frame = OutputFrame::Annotation(json!({
            "type": "sources",
            "data": {"nodes": [{"id": "1", "url": "/sample.pdf"}]}
        }));
        assert_eq!(
            frame.encode(),
            Bytes::from(
                "8:[{\"type\":\"sources\",\"data\":{\"nodes\":[{\"id\":\"1\",\"url\":\"/sample.pdf\"}]}}]\n"
            )
        );
    }

    #[test]
    fn consumer_reads_text_frame_back() {
        let frame = parse_frame("0:\"hello\"\n").unwrap();
        assert_eq!(frame, OutputFrame::Text("hello".to_string()));
    }

    #[test]
    fn consumer_reads_annotation_frame_back() {
        let annotation = json!({"type": "table", "data": {"rows": [1, 2]}});
        let line = OutputFrame::Annotation(annotation.clone()).encode();
        let parsed = parse_frame(std::str::from_utf8(&line).unwrap()).unwrap();
        assert_eq!(parsed, OutputFrame::Annotation(annotation));
    }

    #[test]
    fn parse_frame_rejects_bad_lines() {
        assert!(matches!(parse_frame("hello"), Err(FrameError::MissingPrefix)));
        assert!(matches!(parse_frame("9:\"x\""), Err(FrameError::UnknownPrefix(_))));
        assert!(matches!(parse_frame("0:{oops"), Err(FrameError::InvalidJson(_))));
        assert!(matches!(parse_frame("0:42"), Err(FrameError::UnexpectedShape(_))));
        assert!(matches!(parse_frame("8:[1,2]"), Err(FrameError::UnexpectedShape(_))));
    }
}

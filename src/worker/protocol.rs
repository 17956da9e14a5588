//! # Worker Line Protocol
//!
//! The external inference worker speaks line-delimited JSON over stdio: one
//! request object per line on stdin, one reply object per line on stdout.
//! Replies are either a verdict for the in-flight request or a `ready` /
//! `status` announcement, which is logged but never routed to a session.

use crate::relay::messages::Landmark;
use serde::{Deserialize, Serialize};

/// A request line written to the worker's stdin.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    /// Ask the worker to classify one frame.
    #[serde(rename = "process_frame")]
    ProcessFrame {
        session_id: String,
        frame: String,
        target_gesture: String,
    },
}

impl WorkerRequest {
    /// Serialize to a single protocol line (without the trailing newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A reply line read from the worker's stdout.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerReply {
    /// Classification verdict for the in-flight frame.
    #[serde(rename = "gesture_result")]
    GestureResult {
        hands_detected: bool,
        #[serde(default)]
        predicted: String,
        #[serde(default)]
        confidence: f32,
        #[serde(default)]
        landmarks_ok: bool,
        #[serde(default)]
        landmarks: Vec<Landmark>,
    },

    /// Startup announcement, emitted once the worker can take requests.
    #[serde(rename = "ready")]
    Ready {
        #[serde(default)]
        message: Option<String>,
    },

    /// Informational status line.
    #[serde(rename = "status")]
    Status {
        #[serde(default)]
        message: Option<String>,
    },
}

impl WorkerReply {
    /// Parse one stdout line. Returns `None` for anything that is not a
    /// known protocol object — the bridge logs and ignores such lines
    /// instead of failing.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line_shape() {
        let request = WorkerRequest::ProcessFrame {
            session_id: "s1".to_string(),
            frame: "aGVsbG8=".to_string(),
            target_gesture: "A".to_string(),
        };

        let line = request.to_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "process_frame");
        assert_eq!(value["session_id"], "s1");
        assert_eq!(value["frame"], "aGVsbG8=");
        assert_eq!(value["target_gesture"], "A");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_verdict_line_parses() {
        let line = r#"{"type":"gesture_result","hands_detected":true,"predicted":"B","confidence":0.81,"landmarks_ok":true,"landmarks":[]}"#;
        match WorkerReply::parse(line) {
            Some(WorkerReply::GestureResult {
                hands_detected,
                predicted,
                confidence,
                ..
            }) => {
                assert!(hands_detected);
                assert_eq!(predicted, "B");
                assert!((confidence - 0.81).abs() < f32::EPSILON);
            }
            other => panic!("Expected verdict, got {:?}", other),
        }
    }

    #[test]
    fn test_status_lines_parse() {
        assert!(matches!(
            WorkerReply::parse(r#"{"type":"ready","message":"model loaded"}"#),
            Some(WorkerReply::Ready { .. })
        ));
        assert!(matches!(
            WorkerReply::parse(r#"{"type":"status"}"#),
            Some(WorkerReply::Status { message: None })
        ));
    }

    #[test]
    fn test_garbage_lines_are_ignored() {
        assert!(WorkerReply::parse("").is_none());
        assert!(WorkerReply::parse("INFO: created TensorFlow device").is_none());
        assert!(WorkerReply::parse(r#"{"type":"something_else"}"#).is_none());
        assert!(WorkerReply::parse("{not json").is_none());
    }

    #[test]
    fn test_no_hand_verdict_defaults() {
        // A worker may omit prediction fields when no hand is present.
        let line = r#"{"type":"gesture_result","hands_detected":false}"#;
        match WorkerReply::parse(line) {
            Some(WorkerReply::GestureResult {
                hands_detected,
                predicted,
                landmarks,
                ..
            }) => {
                assert!(!hands_detected);
                assert!(predicted.is_empty());
                assert!(landmarks.is_empty());
            }
            other => panic!("Expected verdict, got {:?}", other),
        }
    }
}

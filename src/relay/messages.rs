//! # Relay Wire Messages
//!
//! JSON message types exchanged between a client session and the relay over
//! the `/ws/gesture` WebSocket. All messages are tagged objects; the `type`
//! field selects the variant on both directions of the connection.
//!
//! ## Protocol:
//! - **Client → Relay**: `start_recognition`, `stop_recognition`,
//!   `frame_data`, `pong`
//! - **Relay → Client**: `connection_established`, `recognition_started`,
//!   `recognition_stopped`, `gesture_result`, `error`, `ping`
//!
//! Frames are only meaningful while recognition is active; a new frame always
//! replaces the previous pending one (see [`crate::relay::registry`]).

use serde::{Deserialize, Serialize};

/// Number of tracked hand points in a complete landmark set.
pub const LANDMARK_POINTS: usize = 21;

/// Messages sent by a client session to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Begin recognition against a target gesture label.
    #[serde(rename = "start_recognition")]
    StartRecognition {
        /// Label the client wants to practice (e.g. a letter)
        target_gesture: String,
    },

    /// Stop recognition; the session stays connected.
    #[serde(rename = "stop_recognition")]
    StopRecognition,

    /// One encoded camera frame. Replaces any previously pending frame.
    #[serde(rename = "frame_data")]
    FrameData {
        /// Base64-encoded image payload
        frame: String,
    },

    /// Heartbeat acknowledgment, echoing the ping timestamp.
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
}

/// Messages sent by the relay to a client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First message after accept; carries the generated session id.
    #[serde(rename = "connection_established")]
    ConnectionEstablished { session_id: String },

    /// Acknowledgment for `start_recognition`.
    #[serde(rename = "recognition_started")]
    RecognitionStarted { target_gesture: String },

    /// Acknowledgment for `stop_recognition`.
    #[serde(rename = "recognition_stopped")]
    RecognitionStopped,

    /// One inference verdict, routed only to the owning session.
    #[serde(rename = "gesture_result")]
    GestureResult(Verdict),

    /// User-facing error for a rejected or failed action.
    #[serde(rename = "error")]
    Error { message: String },

    /// Liveness probe; the client must answer with `pong`.
    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
}

/// One inference result for one dispatched frame.
///
/// Verdicts are transient: built by the worker bridge when the external
/// process answers, routed once through the registry, then consumed by the
/// client's scoring state. Nothing retains them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Session that dispatched the originating frame
    pub session_id: String,

    /// Target label the session was practicing at dispatch time
    pub target: String,

    /// Label predicted by the worker
    pub predicted: String,

    /// Prediction confidence in 0..1
    pub confidence: f32,

    /// Whether the worker found a hand in the frame
    pub hands_detected: bool,

    /// Whether the tracked point set met the worker's quality bar
    pub landmarks_ok: bool,

    /// Tracked hand points; a complete set has [`LANDMARK_POINTS`] entries
    #[serde(default)]
    pub landmarks: Vec<Landmark>,

    /// Server emission timestamp (milliseconds since the Unix epoch)
    pub server_ts: u64,

    /// Worker round-trip for this frame, in milliseconds
    pub inference_ms: u64,
}

/// One tracked hand point, normalized to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position in 0..1
    pub x: f32,
    /// Vertical position in 0..1
    pub y: f32,
    /// Visibility score in 0..1
    pub visibility: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialization() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_recognition","target_gesture":"A"}"#).unwrap();
        match msg {
            ClientMessage::StartRecognition { target_gesture } => {
                assert_eq!(target_gesture, "A");
            }
            _ => panic!("Wrong message type"),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"stop_recognition"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StopRecognition));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"frame_data","frame":"aGVsbG8="}"#).unwrap();
        match msg {
            ClientMessage::FrameData { frame } => assert_eq!(frame, "aGVsbG8="),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_server_message_serialization() {
        let json = serde_json::to_string(&ServerMessage::ConnectionEstablished {
            session_id: "abc123".to_string(),
        })
        .unwrap();
        assert!(json.contains("connection_established"));
        assert!(json.contains("abc123"));

        let json = serde_json::to_string(&ServerMessage::RecognitionStopped).unwrap();
        assert!(json.contains("recognition_stopped"));
    }

    #[test]
    fn test_verdict_round_trip() {
        let verdict = Verdict {
            session_id: "s1".to_string(),
            target: "A".to_string(),
            predicted: "A".to_string(),
            confidence: 0.92,
            hands_detected: true,
            landmarks_ok: true,
            landmarks: vec![
                Landmark {
                    x: 0.5,
                    y: 0.5,
                    visibility: 1.0
                };
                LANDMARK_POINTS
            ],
            server_ts: 1_700_000_000_000,
            inference_ms: 45,
        };

        let json = serde_json::to_string(&ServerMessage::GestureResult(verdict)).unwrap();
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMessage::GestureResult(v) => {
                assert_eq!(v.predicted, "A");
                assert_eq!(v.landmarks.len(), LANDMARK_POINTS);
                assert_eq!(v.inference_ms, 45);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_malformed_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"unknown_kind"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json at all").is_err());
    }
}

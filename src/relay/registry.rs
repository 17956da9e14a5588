//! # Session Registry
//!
//! Tracks every live WebSocket session: liveness, recognition state, and the
//! single-slot pending frame. The registry is the relay's source of truth —
//! the WebSocket actors are thin adapters that translate socket events into
//! calls on it.
//!
//! ## Coalescing invariant:
//! A session holds at most one undispatched frame. A newly arrived frame
//! always replaces the previous one, never queues. The worker is strictly
//! slower than the camera, so this bounds both memory and feedback staleness
//! to one inference cycle regardless of producer rate.
//!
//! ## Session lifecycle:
//! 1. **Accepted**: id generated, `connection_established` sent
//! 2. **Recognizing**: `start_recognition` received, frames accepted
//! 3. **Idle**: `stop_recognition` received, frames discarded
//! 4. **Removed**: socket closed, or two heartbeat intervals without an ack

use crate::relay::messages::{ServerMessage, Verdict};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One registered session.
///
/// The outbound sender is the session's only handle on its socket: messages
/// pushed here are streamed out by the owning WebSocket actor, and dropping
/// the sender ends that stream, which closes the connection.
struct Session {
    /// Channel to the WebSocket actor that owns this connection
    tx: UnboundedSender<ServerMessage>,

    /// Last time this session acknowledged a liveness probe
    last_seen: Instant,

    /// Whether recognition is currently active
    recognizing: bool,

    /// Target label while recognition is active
    target: Option<String>,

    /// The coalescing slot: at most one undispatched frame
    pending_frame: Option<String>,
}

/// A coalesced frame selected for dispatch to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameJob {
    pub session_id: String,
    pub frame: String,
    pub target: String,
}

/// Counts reported by the status endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RegistryStats {
    pub total_sessions: usize,
    pub recognizing_sessions: usize,
}

/// Registry of all live sessions.
///
/// ## Thread Safety:
/// The session map sits behind an internal `RwLock`; every method takes
/// `&self` and holds the lock only for the duration of the call, so the
/// WebSocket actors, the worker bridge callback, and the heartbeat tick can
/// all call in concurrently. Admission to the worker stays single-slot
/// because frame selection (`next_ready`) removes the frame from its slot
/// under the lock and the bridge serializes dispatch behind its own lock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,

    /// Maximum number of concurrent sessions allowed
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Register a new session and send it the connection acknowledgment.
    ///
    /// ## Returns:
    /// - **Ok(session_id)**: session registered, ack queued on its channel
    /// - **Err(message)**: rejected (session limit reached)
    pub fn accept(&self, tx: UnboundedSender<ServerMessage>) -> Result<String, String> {
        let mut sessions = self.sessions.write().unwrap();

        if sessions.len() >= self.max_sessions {
            return Err(format!(
                "Maximum concurrent sessions ({}) reached",
                self.max_sessions
            ));
        }

        let session_id = Uuid::new_v4().to_string();

        let _ = tx.send(ServerMessage::ConnectionEstablished {
            session_id: session_id.clone(),
        });

        sessions.insert(
            session_id.clone(),
            Session {
                tx,
                last_seen: Instant::now(),
                recognizing: false,
                target: None,
                pending_frame: None,
            },
        );

        info!("Session accepted: {} ({} total)", session_id, sessions.len());
        Ok(session_id)
    }

    /// Refresh a session's liveness timestamp (heartbeat acknowledgment).
    pub fn touch(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session.last_seen = Instant::now();
        }
    }

    /// Activate recognition for a session and acknowledge it.
    pub fn start_recognition(&self, session_id: &str, target: String) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session.recognizing = true;
            session.target = Some(target.clone());
            let _ = session.tx.send(ServerMessage::RecognitionStarted {
                target_gesture: target,
            });
        }
    }

    /// Deactivate recognition; the pending frame (if any) is discarded.
    pub fn stop_recognition(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session.recognizing = false;
            session.target = None;
            session.pending_frame = None;
            let _ = session.tx.send(ServerMessage::RecognitionStopped);
        }
    }

    /// Store a frame in the session's coalescing slot.
    ///
    /// Overwrites any previously pending frame. Frames arriving while
    /// recognition is inactive are discarded.
    ///
    /// ## Returns:
    /// `true` if the frame was stored and a dispatch attempt is worthwhile.
    pub fn store_frame(&self, session_id: &str, frame: String) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(session_id) {
            Some(session) if session.recognizing => {
                if session.pending_frame.is_some() {
                    debug!("Coalescing frame for session {}", session_id);
                }
                session.pending_frame = Some(frame);
                true
            }
            Some(_) => {
                debug!(
                    "Dropping frame for session {} (recognition inactive)",
                    session_id
                );
                false
            }
            None => false,
        }
    }

    /// Select the next coalesced frame for dispatch, emptying its slot.
    ///
    /// First-ready-first-served: any session with a pending frame may be
    /// picked; no fairness guarantee beyond that.
    pub fn next_ready(&self) -> Option<FrameJob> {
        let mut sessions = self.sessions.write().unwrap();
        for (session_id, session) in sessions.iter_mut() {
            if !session.recognizing {
                continue;
            }
            if let Some(frame) = session.pending_frame.take() {
                return Some(FrameJob {
                    session_id: session_id.clone(),
                    frame,
                    target: session.target.clone().unwrap_or_default(),
                });
            }
        }
        None
    }

    /// Route a verdict to its owning session.
    ///
    /// A missing or no-longer-recognizing session is not an error: the
    /// session ended before the worker replied, and the verdict is dropped.
    pub fn on_verdict(&self, verdict: Verdict) {
        let sessions = self.sessions.read().unwrap();
        match sessions.get(&verdict.session_id) {
            Some(session) if session.recognizing => {
                let _ = session.tx.send(ServerMessage::GestureResult(verdict));
            }
            _ => {
                debug!(
                    "Dropping verdict for departed session {}",
                    verdict.session_id
                );
            }
        }
    }

    /// Send a user-facing error to one session.
    pub fn deliver_error(&self, session_id: &str, message: &str) {
        let sessions = self.sessions.read().unwrap();
        if let Some(session) = sessions.get(session_id) {
            let _ = session.tx.send(ServerMessage::Error {
                message: message.to_string(),
            });
        }
    }

    /// Send a liveness probe to every session.
    pub fn broadcast_ping(&self, timestamp: u64) {
        let sessions = self.sessions.read().unwrap();
        for session in sessions.values() {
            let _ = session.tx.send(ServerMessage::Ping { timestamp });
        }
    }

    /// Remove every session whose last acknowledgment is older than
    /// `max_idle`, discarding pending frames.
    ///
    /// Dropping a session's sender ends the actor's outbound stream, which
    /// closes the socket — no separate close signal is needed.
    pub fn evict_stale(&self, now: Instant, max_idle: Duration) -> Vec<String> {
        let mut sessions = self.sessions.write().unwrap();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_seen) > max_idle)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            sessions.remove(session_id);
            warn!("Terminated stale session: {}", session_id);
        }

        stale
    }

    /// Remove a session on disconnect, discarding any pending frame.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!("Session removed: {} ({} left)", session_id, sessions.len());
        }
        removed
    }

    /// Session counts for the status and health endpoints.
    pub fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.read().unwrap();
        RegistryStats {
            total_sessions: sessions.len(),
            recognizing_sessions: sessions.values().filter(|s| s.recognizing).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry_with_session() -> (
        SessionRegistry,
        String,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let registry = SessionRegistry::new(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session_id = registry.accept(tx).unwrap();
        // Drain the connection acknowledgment.
        match rx.try_recv().unwrap() {
            ServerMessage::ConnectionEstablished { session_id: id } => {
                assert_eq!(id, session_id)
            }
            other => panic!("Expected connection_established, got {:?}", other),
        }
        (registry, session_id, rx)
    }

    fn verdict_for(session_id: &str) -> Verdict {
        Verdict {
            session_id: session_id.to_string(),
            target: "A".to_string(),
            predicted: "A".to_string(),
            confidence: 0.9,
            hands_detected: true,
            landmarks_ok: true,
            landmarks: Vec::new(),
            server_ts: 0,
            inference_ms: 10,
        }
    }

    #[test]
    fn test_session_limit() {
        let registry = SessionRegistry::new(1);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(registry.accept(tx1).is_ok());
        assert!(registry.accept(tx2).is_err());
    }

    #[test]
    fn test_coalescing_keeps_only_newest_frame() {
        let (registry, id, _rx) = registry_with_session();
        registry.start_recognition(&id, "A".to_string());

        for n in 0..5 {
            assert!(registry.store_frame(&id, format!("frame-{}", n)));
        }

        let job = registry.next_ready().unwrap();
        assert_eq!(job.frame, "frame-4");
        assert_eq!(job.target, "A");

        // The slot was emptied; the first four frames were never queued.
        assert!(registry.next_ready().is_none());
    }

    #[test]
    fn test_frames_discarded_while_inactive() {
        let (registry, id, _rx) = registry_with_session();

        assert!(!registry.store_frame(&id, "early".to_string()));
        assert!(registry.next_ready().is_none());

        registry.start_recognition(&id, "B".to_string());
        assert!(registry.store_frame(&id, "ok".to_string()));

        registry.stop_recognition(&id);
        // Stopping discards the pending frame.
        assert!(registry.next_ready().is_none());
    }

    #[test]
    fn test_verdict_routed_to_owner_only() {
        let (registry, id, mut rx) = registry_with_session();
        registry.start_recognition(&id, "A".to_string());
        rx.try_recv().unwrap(); // recognition_started

        registry.on_verdict(verdict_for(&id));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::GestureResult(_)
        ));

        // A verdict for an unknown session is dropped silently.
        registry.on_verdict(verdict_for("no-such-session"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_verdict_dropped_after_stop() {
        let (registry, id, mut rx) = registry_with_session();
        registry.start_recognition(&id, "A".to_string());
        registry.stop_recognition(&id);
        rx.try_recv().unwrap(); // recognition_started
        rx.try_recv().unwrap(); // recognition_stopped

        registry.on_verdict(verdict_for(&id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_session_evicted_with_pending_frame() {
        let (registry, id, _rx) = registry_with_session();
        registry.start_recognition(&id, "A".to_string());
        assert!(registry.store_frame(&id, "frame".to_string()));

        let interval = Duration::from_secs(30);
        let now = Instant::now();

        // Within two intervals: still alive.
        assert!(registry.evict_stale(now + interval, interval * 2).is_empty());

        // Past two intervals with no ack: evicted, pending frame discarded.
        let evicted = registry.evict_stale(now + interval * 2 + Duration::from_secs(1), interval * 2);
        assert_eq!(evicted, vec![id]);
        assert!(registry.next_ready().is_none());
        assert_eq!(registry.stats().total_sessions, 0);
    }

    #[test]
    fn test_touch_defers_eviction() {
        let (registry, id, mut rx) = registry_with_session();
        let interval = Duration::from_secs(30);
        let start = Instant::now();

        registry.touch(&id);
        assert!(registry
            .evict_stale(start + interval, interval * 2)
            .is_empty());
        assert!(registry.stats().total_sessions == 1);

        registry.broadcast_ping(42);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::Ping { timestamp: 42 }
        ));
    }

    #[test]
    fn test_remove_on_disconnect() {
        let (registry, id, _rx) = registry_with_session();
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.next_ready().is_none());
    }
}

//! # Session Relay
//!
//! Fan-in/fan-out between many WebSocket sessions and the single inference
//! worker. Sessions coalesce frames into one pending slot each
//! ([`registry`]); the [`pump`] admits exactly one frame at a time to the
//! worker bridge; verdicts are routed back only to the session that owns
//! them ([`registry::SessionRegistry::on_verdict`]).

pub mod messages;
pub mod registry;

use crate::worker::bridge::{unix_millis, DispatchOutcome, WorkerBridge};
use registry::SessionRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Admission rule: when the worker is idle and some session holds a pending
/// frame, dispatch exactly one (first-ready-first-served).
///
/// Called after every frame arrival, after every verdict, and after an
/// in-flight request expires. A delivery failure drops that session's frame
/// with a user-facing error and tries the next pending one; a busy worker
/// or an empty backlog ends the attempt.
pub async fn pump(registry: &Arc<SessionRegistry>, bridge: &Arc<WorkerBridge>) {
    loop {
        let selector = registry.clone();
        match bridge.dispatch_next(move || selector.next_ready()).await {
            DispatchOutcome::Dispatched => {
                debug!("Frame dispatched to worker");
                break;
            }
            DispatchOutcome::Busy | DispatchOutcome::Idle => break,
            DispatchOutcome::Failed {
                session_id,
                message,
            } => {
                registry.deliver_error(&session_id, &message);
            }
        }
    }
}

/// Periodic relay maintenance, one iteration per heartbeat interval:
/// probe every session, evict the stale ones, expire a wedged worker
/// request, and pump again if the worker slot was freed.
pub async fn run_tick_loop(
    registry: Arc<SessionRegistry>,
    bridge: Arc<WorkerBridge>,
    heartbeat_interval: Duration,
    request_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(heartbeat_interval);
    loop {
        ticker.tick().await;

        registry.broadcast_ping(unix_millis());
        registry.evict_stale(Instant::now(), heartbeat_interval * 2);

        if bridge.expire_in_flight(request_timeout).await {
            pump(&registry, &bridge).await;
        }
    }
}

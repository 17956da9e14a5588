//! # Worker Bridge
//!
//! Owns the single external inference process and everything about talking
//! to it: spawning, the request line on stdin, the reply reader on stdout,
//! and the one in-flight request slot.
//!
//! ## Serialization invariant:
//! The worker is a stateful, single-slot resource. At most one request is in
//! flight at any time, across all sessions — `dispatch_next` checks and
//! fills the slot under one lock, so two racing dispatch attempts cannot
//! overlap requests.
//!
//! ## Crash policy:
//! On worker exit the busy slot is cleared and the in-flight request is
//! abandoned; the process is **not** respawned immediately. The next
//! dispatch attempt restarts it lazily. A request the worker never answers
//! is expired by the heartbeat tick (see [`WorkerBridge::expire_in_flight`]).

use crate::config::WorkerConfig;
use crate::relay::messages::Verdict;
use crate::relay::registry::FrameJob;
use crate::worker::protocol::{WorkerReply, WorkerRequest};
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Callback invoked with every verdict the worker produces.
pub type VerdictHandler = Arc<dyn Fn(Verdict) + Send + Sync>;

/// The request currently being processed by the worker.
struct InFlight {
    session_id: String,
    target: String,
    dispatched_at: Instant,
}

/// Mutable bridge state, all behind one async lock.
#[derive(Default)]
struct BridgeInner {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    in_flight: Option<InFlight>,

    /// Bumped on every spawn so a reader task from a replaced process
    /// cannot clear state belonging to its successor.
    generation: u64,
}

/// Outcome of one dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A frame was written to the worker; the slot is now occupied.
    Dispatched,
    /// A request is already in flight; nothing was selected.
    Busy,
    /// No session had a pending frame.
    Idle,
    /// The selected frame could not be delivered; it has been dropped.
    Failed { session_id: String, message: String },
}

/// Bridge to the external inference process.
pub struct WorkerBridge {
    config: WorkerConfig,
    inner: Mutex<BridgeInner>,
    handler: RwLock<Option<VerdictHandler>>,
}

impl WorkerBridge {
    pub fn new(config: WorkerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            inner: Mutex::new(BridgeInner::default()),
            handler: RwLock::new(None),
        })
    }

    /// Register the callback that receives parsed verdicts.
    pub fn set_verdict_handler(&self, handler: VerdictHandler) {
        *self.handler.write().unwrap() = Some(handler);
    }

    /// Spawn the worker eagerly at startup.
    ///
    /// Failure is not fatal: the server runs without recognition and the
    /// bridge retries on the next dispatch attempt.
    pub async fn start(self: &Arc<Self>) -> Result<(), String> {
        let mut inner = self.inner.lock().await;
        self.ensure_worker(&mut inner)
    }

    /// Dispatch the next pending frame if the worker is idle.
    ///
    /// `next` is called only when the slot is free, under the bridge lock,
    /// so the frame it removes from its coalescing slot is either written to
    /// the worker or reported as `Failed` — never silently lost to a race.
    pub async fn dispatch_next(
        self: &Arc<Self>,
        next: impl FnOnce() -> Option<FrameJob>,
    ) -> DispatchOutcome {
        let mut inner = self.inner.lock().await;

        if inner.in_flight.is_some() {
            return DispatchOutcome::Busy;
        }

        let job = match next() {
            Some(job) => job,
            None => return DispatchOutcome::Idle,
        };

        if let Err(message) = self.ensure_worker(&mut inner) {
            return DispatchOutcome::Failed {
                session_id: job.session_id,
                message,
            };
        }

        let request = WorkerRequest::ProcessFrame {
            session_id: job.session_id.clone(),
            frame: job.frame,
            target_gesture: job.target.clone(),
        };

        let line = match request.to_line() {
            Ok(line) => line,
            Err(err) => {
                return DispatchOutcome::Failed {
                    session_id: job.session_id,
                    message: format!("Failed to encode worker request: {}", err),
                }
            }
        };

        // stdin presence is guaranteed by ensure_worker above.
        let stdin = match inner.stdin.as_mut() {
            Some(stdin) => stdin,
            None => {
                return DispatchOutcome::Failed {
                    session_id: job.session_id,
                    message: "Worker process is not running".to_string(),
                }
            }
        };

        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };

        if let Err(err) = write.await {
            warn!("Worker stdin write failed: {}", err);
            inner.stdin = None;
            inner.child = None;
            return DispatchOutcome::Failed {
                session_id: job.session_id,
                message: "Failed to reach inference worker".to_string(),
            };
        }

        inner.in_flight = Some(InFlight {
            session_id: job.session_id,
            target: job.target,
            dispatched_at: Instant::now(),
        });

        DispatchOutcome::Dispatched
    }

    /// Abandon an in-flight request older than `timeout`.
    ///
    /// A crashed or wedged worker must not strand the busy slot forever;
    /// the heartbeat tick calls this and pumps again when it returns `true`.
    /// The abandoned request's eventual reply, if one ever arrives, finds
    /// the slot empty and is dropped.
    pub async fn expire_in_flight(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(in_flight) = &inner.in_flight {
            if in_flight.dispatched_at.elapsed() >= timeout {
                warn!(
                    "Abandoning worker request for session {} after {:?}",
                    in_flight.session_id, timeout
                );
                inner.in_flight = None;
                return true;
            }
        }
        false
    }

    /// Whether the worker process is currently running.
    pub async fn is_alive(&self) -> bool {
        self.inner.lock().await.stdin.is_some()
    }

    /// Whether a request is currently in flight.
    pub async fn is_busy(&self) -> bool {
        self.inner.lock().await.in_flight.is_some()
    }

    /// Spawn the worker process if it is not already running.
    fn ensure_worker(self: &Arc<Self>, inner: &mut BridgeInner) -> Result<(), String> {
        if inner.stdin.is_some() {
            return Ok(());
        }

        info!(
            "Starting inference worker: {} {}",
            self.config.command,
            self.config.args.join(" ")
        );

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| format!("Failed to start inference worker: {}", err))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| "Worker stdin unavailable".to_string())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Worker stdout unavailable".to_string())?;
        let stderr = child.stderr.take();

        inner.generation += 1;
        let generation = inner.generation;

        tokio::spawn(Self::read_worker_output(self.clone(), stdout, generation));
        if let Some(stderr) = stderr {
            tokio::spawn(Self::read_worker_stderr(stderr));
        }

        inner.child = Some(child);
        inner.stdin = Some(stdin);
        Ok(())
    }

    /// Reader task: one iteration per stdout line until the process exits.
    async fn read_worker_output(self: Arc<Self>, stdout: ChildStdout, generation: u64) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => self.handle_line(&line).await,
                Ok(None) => break,
                Err(err) => {
                    error!("Worker stdout read error: {}", err);
                    break;
                }
            }
        }
        self.handle_worker_exit(generation).await;
    }

    /// Worker stderr is logged, with the usual ML framework noise filtered.
    async fn read_worker_stderr(stderr: ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains("WARNING") || line.contains("W0000") {
                continue;
            }
            error!("Worker stderr: {}", line);
        }
    }

    /// Classify and act on one stdout line.
    async fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match WorkerReply::parse(line) {
            Some(WorkerReply::GestureResult {
                hands_detected,
                predicted,
                confidence,
                landmarks_ok,
                landmarks,
            }) => {
                let in_flight = {
                    let mut inner = self.inner.lock().await;
                    inner.in_flight.take()
                };

                let in_flight = match in_flight {
                    Some(in_flight) => in_flight,
                    None => {
                        debug!("Verdict with no in-flight request, dropping");
                        return;
                    }
                };

                let verdict = Verdict {
                    session_id: in_flight.session_id,
                    target: in_flight.target,
                    predicted,
                    confidence,
                    hands_detected,
                    landmarks_ok,
                    landmarks,
                    server_ts: unix_millis(),
                    inference_ms: in_flight.dispatched_at.elapsed().as_millis() as u64,
                };

                let handler = self.handler.read().unwrap().clone();
                if let Some(handler) = handler {
                    handler(verdict);
                }
            }
            Some(WorkerReply::Ready { message }) | Some(WorkerReply::Status { message }) => {
                info!("Worker: {}", message.unwrap_or_else(|| "ready".to_string()));
            }
            None => {
                // Not a protocol line; frameworks print banners on stdout too.
                if !line.contains("WARNING") && !line.starts_with("INFO:") {
                    debug!("Unparseable worker line: {}", line);
                }
            }
        }
    }

    /// Called by the reader task when the process's stdout closes.
    async fn handle_worker_exit(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // A newer process has already replaced this one.
            return;
        }

        if let Some(in_flight) = inner.in_flight.take() {
            warn!(
                "Worker exited with request for session {} unanswered",
                in_flight.session_id
            );
        } else {
            warn!("Worker process exited");
        }
        inner.stdin = None;
        inner.child = None;
    }
}

/// Milliseconds since the Unix epoch, for verdict emission timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(command: &str) -> WorkerConfig {
        WorkerConfig {
            command: command.to_string(),
            args: Vec::new(),
            request_timeout_ms: 10_000,
        }
    }

    #[tokio::test]
    async fn test_dispatch_idle_when_nothing_pending() {
        let bridge = WorkerBridge::new(test_config("true"));
        let outcome = bridge.dispatch_next(|| None).await;
        assert!(matches!(outcome, DispatchOutcome::Idle));
        assert!(!bridge.is_busy().await);
    }

    #[tokio::test]
    async fn test_dispatch_failure_when_worker_cannot_spawn() {
        let bridge = WorkerBridge::new(test_config("/nonexistent/worker-binary"));
        let job = FrameJob {
            session_id: "s1".to_string(),
            frame: "frame".to_string(),
            target: "A".to_string(),
        };

        let outcome = bridge.dispatch_next(|| Some(job)).await;
        match outcome {
            DispatchOutcome::Failed { session_id, .. } => assert_eq!(session_id, "s1"),
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(!bridge.is_alive().await);
        assert!(!bridge.is_busy().await);
    }

    #[tokio::test]
    async fn test_single_in_flight_slot() {
        // `cat` consumes request lines without answering, so the slot
        // stays occupied after the first dispatch.
        let bridge = WorkerBridge::new(test_config("cat"));
        let job = |n: u32| FrameJob {
            session_id: format!("s{}", n),
            frame: "frame".to_string(),
            target: "A".to_string(),
        };

        let outcome = bridge.dispatch_next(|| Some(job(1))).await;
        assert!(matches!(outcome, DispatchOutcome::Dispatched));
        assert!(bridge.is_busy().await);

        let outcome = bridge.dispatch_next(|| Some(job(2))).await;
        assert!(matches!(outcome, DispatchOutcome::Busy));
    }

    #[tokio::test]
    async fn test_expire_in_flight_clears_busy() {
        let bridge = WorkerBridge::new(test_config("cat"));
        let job = FrameJob {
            session_id: "s1".to_string(),
            frame: "frame".to_string(),
            target: "A".to_string(),
        };
        assert!(matches!(
            bridge.dispatch_next(|| Some(job)).await,
            DispatchOutcome::Dispatched
        ));

        // Not yet expired with a long timeout.
        assert!(!bridge.expire_in_flight(Duration::from_secs(60)).await);
        assert!(bridge.is_busy().await);

        // A zero timeout expires it immediately.
        assert!(bridge.expire_in_flight(Duration::ZERO).await);
        assert!(!bridge.is_busy().await);
    }
}

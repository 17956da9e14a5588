//! # Reconnecting Client Transport
//!
//! Maintains one resilient WebSocket connection to the relay. On abnormal
//! closure the transport schedules a reconnect with exponential backoff
//! (reset on every successful connect) and keeps trying until [`CoachClient::close`]
//! is called. Inbound messages land in a single-slot mailbox; the render
//! loop drains it at its own pace. Outbound frames are produced by an
//! independent fixed-rate loop, so frame production is bounded regardless
//! of inference or render speed.

use crate::client::mailbox::LatestSlot;
use crate::client::{reconnect_delay, FRAME_INTERVAL_MS};
use crate::relay::messages::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Connection options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Relay WebSocket URL (e.g. `ws://localhost:8080/ws/gesture`)
    pub url: String,

    /// Interval between outgoing frames
    pub frame_interval: Duration,
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            frame_interval: Duration::from_millis(FRAME_INTERVAL_MS),
        }
    }
}

/// Handle to the transport's shared state.
///
/// ## Concurrency:
/// Three loops run without shared mutable state beyond single-slot
/// mailboxes: the connection task (network receive, writes the inbound
/// slot), the frame-send loop, and the caller's render loop (drains the
/// slot). Each slot has one writer and one reader with last-write-wins
/// semantics.
pub struct CoachClient {
    options: ClientOptions,

    /// Latest inbound message, drained by the render loop
    mailbox: Arc<LatestSlot<ServerMessage>>,

    /// Sender into the currently-open connection, if any
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>>,

    /// Set by `close()`; disables all future reconnection
    shutdown: Arc<AtomicBool>,

    /// Wakes the connection task out of reads and backoff sleeps
    shutdown_notify: Arc<Notify>,

    connected: Arc<AtomicBool>,
}

impl CoachClient {
    /// Connect with default options. Reconnection starts immediately and
    /// continues until `close()`.
    pub fn connect(url: impl Into<String>) -> Self {
        Self::with_options(ClientOptions::new(url))
    }

    pub fn with_options(options: ClientOptions) -> Self {
        let client = Self {
            options,
            mailbox: Arc::new(LatestSlot::new()),
            outbound: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            connected: Arc::new(AtomicBool::new(false)),
        };

        tokio::spawn(run_connection(
            client.options.url.clone(),
            client.mailbox.clone(),
            client.outbound.clone(),
            client.shutdown.clone(),
            client.shutdown_notify.clone(),
            client.connected.clone(),
        ));

        client
    }

    /// Send a message on the open connection.
    ///
    /// No-ops with a warning when the connection is not open; unsent
    /// messages are never buffered for later.
    pub fn send(&self, message: ClientMessage) {
        let outbound = self.outbound.lock().unwrap();
        match outbound.as_ref() {
            Some(tx) if tx.send(message).is_ok() => {}
            _ => warn!("Cannot send message: not connected"),
        }
    }

    /// Drain the latest inbound message, if any. Called once per display
    /// refresh by the render loop.
    pub fn poll_latest(&self) -> Option<ServerMessage> {
        self.mailbox.take()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the connection and disable reconnection permanently.
    pub fn close(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();
        *self.outbound.lock().unwrap() = None;
        info!("Connection closed by caller");
    }

    /// Fixed-rate frame sender (≈20 Hz by default). Pulls one frame from
    /// `frames` per tick while connected and sends it; runs until the
    /// client is closed. `frames` returning `None` skips the tick.
    pub async fn run_frame_loop(&self, mut frames: impl FnMut() -> Option<String>) {
        let mut ticker = tokio::time::interval(self.options.frame_interval);
        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if !self.is_connected() {
                continue;
            }
            if let Some(frame) = frames() {
                self.send(ClientMessage::FrameData { frame });
            }
        }
    }
}

/// Connection task: connect, pump, and on failure back off and retry.
async fn run_connection(
    url: String,
    mailbox: Arc<LatestSlot<ServerMessage>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>>,
    shutdown: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    connected: Arc<AtomicBool>,
) {
    let mut attempts: u32 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        debug!("Connecting to {}...", url);
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("Connected to {}", url);
                attempts = 0;
                connected.store(true, Ordering::SeqCst);

                let (tx, rx) = mpsc::unbounded_channel();
                *outbound.lock().unwrap() = Some(tx);

                drive_connection(stream, &mailbox, rx, &shutdown, &shutdown_notify).await;

                connected.store(false, Ordering::SeqCst);
                *outbound.lock().unwrap() = None;
            }
            Err(err) => {
                warn!("Connection to {} failed: {}", url, err);
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let delay = reconnect_delay(attempts);
        attempts += 1;
        info!("Reconnecting in {:?} (attempt {})", delay, attempts);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_notify.notified() => break,
        }
    }

    debug!("Connection task finished");
}

/// Pump one open connection until it closes or the client shuts down.
async fn drive_connection(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mailbox: &LatestSlot<ServerMessage>,
    mut rx: mpsc::UnboundedReceiver<ClientMessage>,
    shutdown: &AtomicBool,
    shutdown_notify: &Notify,
) {
    let (mut sink, mut source) = stream.split();
    let shutdown_wait = shutdown_notify.notified();
    tokio::pin!(shutdown_wait);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            let _ = sink.send(Message::Close(None)).await;
            break;
        }

        tokio::select! {
            outgoing = rx.recv() => {
                let Some(message) = outgoing else { break };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => error!("Failed to encode outgoing message: {}", err),
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            // Liveness probes are answered by the transport,
                            // not surfaced to the render loop.
                            Ok(ServerMessage::Ping { timestamp }) => {
                                let pong = ClientMessage::Pong { timestamp };
                                if let Ok(json) = serde_json::to_string(&pong) {
                                    if sink.send(Message::Text(json)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Ok(message) => mailbox.put(message),
                            Err(err) => warn!("Failed to parse server message: {}", err),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        info!("Server closed connection: {:?}", reason);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("WebSocket error: {}", err);
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown_wait => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn poll_until<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_send_without_connection_is_dropped() {
        // Nothing listens on this port; send must warn, not panic or buffer.
        let client = CoachClient::connect("ws://127.0.0.1:9/ws/gesture");
        client.send(ClientMessage::StopRecognition);
        assert!(!client.is_connected());
        client.close();
    }

    #[tokio::test]
    async fn test_loopback_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // Liveness probe: the transport must answer without the render
            // loop ever seeing the ping.
            let ping = serde_json::to_string(&ServerMessage::Ping { timestamp: 7 }).unwrap();
            ws.send(Message::Text(ping)).await.unwrap();

            let pong = loop {
                match ws.next().await.expect("connection closed").unwrap() {
                    Message::Text(text) => break text,
                    _ => continue,
                }
            };
            let pong: ClientMessage = serde_json::from_str(&pong).unwrap();
            assert!(matches!(pong, ClientMessage::Pong { timestamp: 7 }));

            // A burst of messages; only the newest should survive polling.
            for n in 0..3 {
                let msg = serde_json::to_string(&ServerMessage::Error {
                    message: format!("m{}", n),
                })
                .unwrap();
                ws.send(Message::Text(msg)).await.unwrap();
            }

            // Receive one client message.
            let received = loop {
                match ws.next().await.expect("connection closed").unwrap() {
                    Message::Text(text) => break text,
                    _ => continue,
                }
            };
            let received: ClientMessage = serde_json::from_str(&received).unwrap();
            assert!(matches!(
                received,
                ClientMessage::StartRecognition { target_gesture } if target_gesture == "A"
            ));
        });

        let client = CoachClient::connect(format!("ws://{}", addr));
        assert!(poll_until(|| client.is_connected()).await);

        // The burst coalesces in the mailbox; the newest message wins.
        let mut latest = None;
        for _ in 0..200 {
            if let Some(msg) = client.poll_latest() {
                latest = Some(msg);
            }
            if matches!(&latest, Some(ServerMessage::Error { message }) if message == "m2") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        match latest {
            Some(ServerMessage::Error { message }) => assert_eq!(message, "m2"),
            other => panic!("Expected error message, got {:?}", other),
        }

        client.send(ClientMessage::StartRecognition {
            target_gesture: "A".to_string(),
        });

        server.await.unwrap();
        client.close();
        assert!(poll_until(|| !client.is_connected()).await);
    }
}

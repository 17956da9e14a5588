//! # WebSocket Gesture Relay Handler
//!
//! Handles real-time gesture recognition sessions via WebSocket. Clients
//! connect to `/ws/gesture`, receive a session id, and stream encoded camera
//! frames while recognition is active; verdicts come back on the same
//! connection.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: server replies with `connection_established`
//! 2. **Start**: client sends `start_recognition` with a target label
//! 3. **Frames**: client sends `frame_data` messages; only the newest
//!    undispatched frame per session is ever forwarded to the worker
//! 4. **Results**: server sends `gesture_result` messages as the worker
//!    answers
//! 5. **Liveness**: server pings periodically; a client that misses two
//!    intervals is disconnected
//!
//! ## Actor Model:
//! Each connection is an independent Actix actor. The actor is a thin
//! adapter: session state lives in the shared [`SessionRegistry`], and the
//! registry's outbound channel is attached to the actor as a second stream,
//! so everything the relay decides to send simply flows out here.

use crate::relay::messages::{ClientMessage, ServerMessage};
use crate::relay::pump;
use crate::relay::registry::SessionRegistry;
use crate::worker::WorkerBridge;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

/// WebSocket actor for one gesture recognition session.
pub struct GestureWebSocket {
    /// Session id assigned by the registry at accept time
    session_id: Option<String>,

    /// Shared session registry
    registry: Arc<SessionRegistry>,

    /// Bridge to the inference worker
    bridge: Arc<WorkerBridge>,
}

impl GestureWebSocket {
    pub fn new(registry: Arc<SessionRegistry>, bridge: Arc<WorkerBridge>) -> Self {
        Self {
            session_id: None,
            registry,
            bridge,
        }
    }

    /// Send a user-facing error message to the client.
    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, message: &str) {
        let error_msg = ServerMessage::Error {
            message: message.to_string(),
        };
        if let Ok(json) = serde_json::to_string(&error_msg) {
            ctx.text(json);
        }
        warn!("WebSocket error: {}", message);
    }

    /// Dispatch one parsed client message to the registry.
    fn handle_client_message(&mut self, msg: ClientMessage) {
        let session_id = match &self.session_id {
            Some(id) => id.clone(),
            None => return,
        };

        match msg {
            ClientMessage::StartRecognition { target_gesture } => {
                info!(
                    "Session {} starting recognition (target: {})",
                    session_id, target_gesture
                );
                self.registry.start_recognition(&session_id, target_gesture);
            }
            ClientMessage::StopRecognition => {
                info!("Session {} stopping recognition", session_id);
                self.registry.stop_recognition(&session_id);
            }
            ClientMessage::FrameData { frame } => {
                if self.registry.store_frame(&session_id, frame) {
                    let registry = self.registry.clone();
                    let bridge = self.bridge.clone();
                    tokio::spawn(async move {
                        pump(&registry, &bridge).await;
                    });
                }
            }
            ClientMessage::Pong { .. } => {
                self.registry.touch(&session_id);
            }
        }
    }
}

impl Actor for GestureWebSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Register with the session registry and attach its outbound channel.
    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = mpsc::unbounded_channel();

        match self.registry.accept(tx) {
            Ok(session_id) => {
                info!("WebSocket connection started: {}", session_id);
                self.session_id = Some(session_id);
                ctx.add_stream(UnboundedReceiverStream::new(rx));
            }
            Err(message) => {
                self.send_error(ctx, &message);
                ctx.stop();
            }
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(session_id) = &self.session_id {
            info!("WebSocket connection stopped: {}", session_id);
            self.registry.remove(session_id);
        }
    }
}

/// Outbound messages from the registry flow out on the socket.
impl StreamHandler<ServerMessage> for GestureWebSocket {
    fn handle(&mut self, msg: ServerMessage, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg) {
            Ok(json) => ctx.text(json),
            Err(err) => error!("Failed to encode outbound message: {}", err),
        }
    }

    /// The registry dropped our sender (stale eviction): close the socket.
    fn finished(&mut self, ctx: &mut Self::Context) {
        debug!("Outbound channel closed, stopping connection");
        ctx.stop();
    }
}

/// Inbound socket frames.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for GestureWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => self.handle_client_message(client_msg),
                Err(err) => self.send_error(ctx, &format!("Invalid message: {}", err)),
            },
            Ok(ws::Message::Binary(_)) => {
                self.send_error(ctx, "Binary frames are not part of this protocol");
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                if let Some(session_id) = &self.session_id {
                    self.registry.touch(session_id);
                }
            }
            Ok(ws::Message::Pong(_)) => {
                if let Some(session_id) = &self.session_id {
                    self.registry.touch(session_id);
                }
            }
            Ok(ws::Message::Close(reason)) => {
                info!("WebSocket closed: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler: upgrades the HTTP request and hands the
/// connection to a new [`GestureWebSocket`] actor.
pub async fn gesture_websocket(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<Arc<SessionRegistry>>,
    bridge: web::Data<Arc<WorkerBridge>>,
) -> ActixResult<HttpResponse> {
    info!(
        "New WebSocket connection request from: {:?}",
        req.connection_info().peer_addr()
    );

    let websocket = GestureWebSocket::new(registry.get_ref().clone(), bridge.get_ref().clone());
    ws::start(websocket, &req, stream)
}

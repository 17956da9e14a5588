//! # Gesture Coach Backend
//!
//! Real-time gesture practice plumbing: many WebSocket camera sessions fan
//! in to one slow, stateful inference worker, and per-frame verdicts fan
//! back out to the session that owns them. The consumer-side pieces — the
//! reconnecting client transport, the scoring engine, and the spelling
//! progression — live here too, so the binary and the consuming
//! application share one protocol definition.
//!
//! ## Architecture:
//! - [`relay`]: session registry, frame coalescing, verdict routing
//! - [`websocket`]: one actor per connection, adapting sockets to the relay
//! - [`worker`]: bridge to the external line-protocol inference process
//! - [`client`]: resilient client transport with a single-slot mailbox
//! - [`coach`]: scoring and letter/word progression state machines
//! - [`config`], [`state`], [`error`], [`health`], [`middleware`],
//!   [`handlers`]: the HTTP service around it

pub mod client;
pub mod coach;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod relay;
pub mod state;
pub mod websocket;
pub mod worker;

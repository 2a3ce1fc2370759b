//! WebSocket Relay
//!
//! This module contains the duplex streaming pipeline between the client
//! socket and the two upstream legs. It is structured into submodules:
//!
//! - `protocol`: the JSON message format for client-server communication.
//! - `session`: the per-connection dispatcher loop, heartbeat, and teardown.
//! - `upstream`: lifecycle and adapters for the STT and LLM connections.

pub mod protocol;
pub mod session;
pub mod upstream;

pub use session::ws_handler;

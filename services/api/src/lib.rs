//! Relay API Library Crate
//!
//! This library contains the voice relay service: configuration, shared
//! state, routing, the client WebSocket session loop, and the upstream
//! STT/LLM leg adapters. The `bin/api.rs` binary is a thin wrapper around
//! this library.

pub mod audio;
pub mod config;
pub mod router;
pub mod state;
pub mod ws;

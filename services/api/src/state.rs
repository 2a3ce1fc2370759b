//! Shared Application State
//!
//! This module defines the `AppState` struct holding the resources every
//! session shares: the configuration and the process-wide (stateless)
//! completion client. Per-session buffers and upstream handles never live
//! here; each session owns its own.

use crate::config::Config;
use relay_core::llm::CompletionClient;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm_client: Arc<dyn CompletionClient>,
    /// Live session registry, touched only at session start/end for
    /// cleanup bookkeeping.
    pub sessions: Arc<Mutex<HashSet<Uuid>>>,
}

impl AppState {
    pub fn new(config: Config, llm_client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: Arc::new(config),
            llm_client,
            sessions: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

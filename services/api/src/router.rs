//! Axum Router Configuration
//!
//! The routing surface is deliberately small: a plain health body at `/`
//! for hosting infrastructure, and the WebSocket endpoint at `/ws`.

use crate::{state::AppState, ws::ws_handler};
use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

/// Static health response used by hosting infrastructure.
async fn health() -> &'static str {
    "Voice WS server"
}

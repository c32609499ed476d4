//! WebSocket endpoint for live message and presence delivery

pub mod relay;

use crate::state::GatewayState;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(relay::websocket_handler))
}

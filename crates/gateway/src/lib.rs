//! # Tradepost Gateway Crate
//!
//! HTTP and WebSocket surface for the Tradepost messaging backend. REST
//! endpoints cover the inbox, history and send operations; the relay
//! WebSocket carries live message delivery and presence changes.

pub mod error;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use axum::Router;
use std::sync::Arc;

/// Create the main application router with all routes
pub fn create_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .merge(rest::create_rest_routes().with_state(state.clone()))
        .merge(websocket::create_websocket_routes().with_state(state))
}

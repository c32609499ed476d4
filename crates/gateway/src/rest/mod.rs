//! REST endpoints for the gateway

pub mod conversation;
pub mod health;
pub mod message;

use crate::state::GatewayState;
use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;

/// Create all REST routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route(
            "/api/parties/:party_id/conversations",
            get(conversation::list_conversations),
        )
        .route(
            "/api/conversations/:conversation_id/messages",
            get(message::get_history).post(message::send_message),
        )
}

/// Render a unix-milliseconds timestamp the way the API exposes it.
pub(crate) fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

//! Liveness endpoint

use crate::error::GatewayResult;
use crate::state::GatewayState;
use axum::{extract::State, Json};
use serde_json::json;
use std::sync::Arc;

pub async fn health_check(
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<serde_json::Value>> {
    sqlx::query("SELECT 1").fetch_one(&state.pool).await?;

    Ok(Json(json!({
        "status": "ok",
    })))
}

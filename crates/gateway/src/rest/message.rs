//! Message history and send endpoints

use crate::error::GatewayResult;
use crate::rest::format_timestamp;
use crate::state::GatewayState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradepost_database::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: i64,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.public_id.clone(),
            conversation_id: message.conversation_public_id.clone(),
            sender_id: message.sender_id,
            text: message.text.clone(),
            image_url: message.image_url.clone(),
            created_at: format_timestamp(message.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub party_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: i64,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

/// Full history of a conversation, oldest first. Always a fresh fetch.
pub async fn get_history(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> GatewayResult<Json<MessagesResponse>> {
    let messages = state
        .messaging
        .history(&conversation_id, query.party_id)
        .await?;

    Ok(Json(MessagesResponse {
        messages: messages.iter().map(MessageResponse::from).collect(),
    }))
}

/// Persist a message and notify the recipient if online. The response body
/// is the stored message, which doubles as the sender's local echo.
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> GatewayResult<Json<MessageResponse>> {
    let message = state
        .messaging
        .send(
            &conversation_id,
            payload.sender_id,
            payload.text,
            payload.image_url,
        )
        .await?;

    Ok(Json(MessageResponse::from(&message)))
}

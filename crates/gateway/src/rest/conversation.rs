//! Conversation list endpoint

use crate::error::GatewayResult;
use crate::rest::format_timestamp;
use crate::state::GatewayState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradepost_messaging::ConversationSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyResponse {
    pub id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: String,
    pub peer: PartyResponse,
    pub peer_online: bool,
    pub last_message_text: Option<String>,
    pub last_sender_id: Option<i64>,
    pub updated_at: String,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.conversation.public_id,
            peer: PartyResponse {
                id: summary.peer.id,
                display_name: summary.peer.display_name,
                avatar_url: summary.peer.avatar_url,
            },
            peer_online: summary.peer_online,
            last_message_text: summary.conversation.last_message_text,
            last_sender_id: summary.conversation.last_sender_id,
            updated_at: format_timestamp(summary.conversation.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationResponse>,
}

/// A party's inbox, most recently active first.
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
    Path(party_id): Path<i64>,
) -> GatewayResult<Json<ConversationsResponse>> {
    let summaries = state.messaging.conversations_for(party_id).await?;

    Ok(Json(ConversationsResponse {
        conversations: summaries.into_iter().map(Into::into).collect(),
    }))
}

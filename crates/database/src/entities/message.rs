//! Message entity definitions

use serde::{Deserialize, Serialize};

/// One unit of text and/or image content within a conversation. Messages are
/// immutable once created; `created_at` is server-assigned unix milliseconds,
/// monotonically non-decreasing within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub public_id: String,
    pub conversation_id: i64,
    pub conversation_public_id: String,
    pub sender_id: i64,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
}

impl Message {
    pub fn has_content(&self) -> bool {
        self.text.is_some() || self.image_url.is_some()
    }
}

/// Payload for appending to the message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: i64,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

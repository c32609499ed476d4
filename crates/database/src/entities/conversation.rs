//! Conversation entity definitions

use serde::{Deserialize, Serialize};

/// Sentinel recorded as the last-message text for image-only messages, so
/// list views never need to know about attachment types.
pub const PHOTO_MARKER: &str = "Photo";

/// A two-party dialogue container. The member pair is immutable after
/// creation; only the denormalized last-message fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub public_id: String,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub last_message_text: Option<String>,
    pub last_sender_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    pub fn is_member(&self, party_id: i64) -> bool {
        self.buyer_id == party_id || self.seller_id == party_id
    }

    /// The other member of the conversation, if `party_id` is a member.
    pub fn peer_of(&self, party_id: i64) -> Option<i64> {
        if party_id == self.buyer_id {
            Some(self.seller_id)
        } else if party_id == self.seller_id {
            Some(self.buyer_id)
        } else {
            None
        }
    }
}

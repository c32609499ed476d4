//! Delivery events pushed over live relay connections.

use serde::{Deserialize, Serialize};
use tradepost_database::Message;

/// A transient notification addressed to one or more connections. Never
/// persisted: if the recipient is offline the event is dropped and the
/// message log remains the durability mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// A newly appended message for a conversation the recipient is part of.
    Message {
        conversation_id: String,
        message: Message,
    },
    /// Another party's presence flipped. `last_seen` is unix milliseconds.
    Presence {
        party_id: i64,
        online: bool,
        last_seen: i64,
    },
}

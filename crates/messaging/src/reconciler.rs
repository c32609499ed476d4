//! Client-side reconciliation of an open conversation.
//!
//! The rendered list is built by append-only concatenation of (a) the
//! history fetched when the conversation was opened and (b) subsequent live
//! pushes. The sender's own echo comes from the append call's return value,
//! never from the push channel, so duplicate suppression by message id is
//! enough to keep exactly one copy of everything.

use crate::events::DeliveryEvent;
use std::collections::HashSet;
use tradepost_database::Message;

pub struct ConversationView {
    conversation_id: String,
    messages: Vec<Message>,
    seen: HashSet<String>,
}

impl ConversationView {
    /// Start from the message log snapshot taken when the conversation was
    /// opened.
    pub fn open(conversation_id: impl Into<String>, history: Vec<Message>) -> Self {
        let mut view = Self {
            conversation_id: conversation_id.into(),
            messages: Vec::with_capacity(history.len()),
            seen: HashSet::with_capacity(history.len()),
        };
        for message in history {
            view.push(message);
        }
        view
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Append the sender's own message, taken from the append return value.
    /// Returns false if it was already present.
    pub fn record_local_echo(&mut self, message: Message) -> bool {
        self.push(message)
    }

    /// Apply a live push event. Messages for other conversations and
    /// presence changes are ignored; duplicates are dropped. Returns true if
    /// the rendered list grew.
    pub fn apply(&mut self, event: &DeliveryEvent) -> bool {
        match event {
            DeliveryEvent::Message {
                conversation_id,
                message,
            } if *conversation_id == self.conversation_id => self.push(message.clone()),
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: Message) -> bool {
        if self.seen.insert(message.public_id.clone()) {
            self.messages.push(message);
            true
        } else {
            false
        }
    }
}

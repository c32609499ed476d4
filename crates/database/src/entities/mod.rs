//! Domain entities for the database layer

pub mod conversation;
pub mod message;
pub mod party;

pub use conversation::{Conversation, PHOTO_MARKER};
pub use message::{Message, NewMessage};
pub use party::Party;

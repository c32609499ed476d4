//! Error taxonomy for the messaging core.

use thiserror::Error;

/// Errors surfaced by the conversation store, message log and relay.
///
/// `Validation`, `Forbidden` and `NotFound` are returned synchronously to the
/// caller before any side effect. `Storage` aborts a send before any delivery
/// event is emitted. `Transport` is recovered locally by the relay and never
/// reaches the sender.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("invalid message: {0}")]
    Validation(String),

    #[error("party {party_id} is not a member of conversation {conversation_id}")]
    Forbidden { party_id: i64, conversation_id: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<sqlx::Error> for MessagingError {
    fn from(error: sqlx::Error) -> Self {
        MessagingError::Storage(error.to_string())
    }
}

/// General database error for connection and migration plumbing.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

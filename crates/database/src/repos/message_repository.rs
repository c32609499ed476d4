//! Repository for the append-only message log.

use crate::entities::{Conversation, Message, NewMessage};
use crate::types::{MessagingError, MessagingResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message to a conversation's log.
    ///
    /// The stored timestamp is `max(now, latest timestamp in the
    /// conversation)` so that creation order and timestamp order agree even
    /// when the wall clock steps backwards. Callers serialise appends per
    /// conversation; membership and content validation happen before this
    /// call.
    pub async fn append(
        &self,
        conversation: &Conversation,
        new_message: &NewMessage,
    ) -> MessagingResult<Message> {
        let public_id = cuid2::create_id();
        let now = chrono::Utc::now().timestamp_millis();
        let floor = self.last_created_at(conversation.id).await?.unwrap_or(0);
        let created_at = now.max(floor);

        let result = sqlx::query(
            "INSERT INTO messages (public_id, conversation_id, sender_id, text, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(conversation.id)
        .bind(new_message.sender_id)
        .bind(&new_message.text)
        .bind(&new_message.image_url)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        let message_id = result.last_insert_rowid();

        info!(
            message_id,
            public_id = %public_id,
            conversation_id = conversation.id,
            sender_id = new_message.sender_id,
            "appended message"
        );

        Ok(Message {
            id: message_id,
            public_id,
            conversation_id: conversation.id,
            conversation_public_id: conversation.public_id.clone(),
            sender_id: new_message.sender_id,
            text: new_message.text.clone(),
            image_url: new_message.image_url.clone(),
            created_at,
        })
    }

    /// All messages of a conversation in creation order. A fresh query each
    /// call; this log does not page.
    pub async fn list(&self, conversation: &Conversation) -> MessagingResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, public_id, conversation_id, sender_id, text, image_url, created_at
             FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        rows.iter()
            .map(|row| map_message(row, &conversation.public_id))
            .collect()
    }

    pub async fn last_created_at(&self, conversation_id: i64) -> MessagingResult<Option<i64>> {
        let row = sqlx::query("SELECT MAX(created_at) as latest FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MessagingError::Storage(e.to_string()))?;

        row.try_get("latest")
            .map_err(|e| MessagingError::Storage(e.to_string()))
    }
}

fn map_message(row: &SqliteRow, conversation_public_id: &str) -> MessagingResult<Message> {
    Ok(Message {
        id: row
            .try_get("id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        conversation_id: row
            .try_get("conversation_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        conversation_public_id: conversation_public_id.to_string(),
        sender_id: row
            .try_get("sender_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        text: row
            .try_get("text")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        image_url: row
            .try_get("image_url")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
    })
}

//! Repository for conversation data access operations.

use crate::entities::Conversation;
use crate::types::{MessagingError, MessagingResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const CONVERSATION_COLUMNS: &str = "id, public_id, buyer_id, seller_id, \
     last_message_text, last_sender_id, created_at, updated_at";

pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation between two parties. Pair creation happens on
    /// first contact in the surrounding marketplace; tests and seeding use
    /// this directly.
    pub async fn create(&self, buyer_id: i64, seller_id: i64) -> MessagingResult<Conversation> {
        let public_id = cuid2::create_id();
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            "INSERT INTO conversations (public_id, buyer_id, seller_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(buyer_id)
        .bind(seller_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        info!(
            conversation_id = result.last_insert_rowid(),
            public_id = %public_id,
            buyer_id,
            seller_id,
            "created conversation"
        );

        Ok(Conversation {
            id: result.last_insert_rowid(),
            public_id,
            buyer_id,
            seller_id,
            last_message_text: None,
            last_sender_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> MessagingResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        row.map(|row| map_conversation(&row)).transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> MessagingResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        row.map(|row| map_conversation(&row)).transpose()
    }

    /// All conversations a party is a member of, most recently active first.
    pub async fn find_for_party(&self, party_id: i64) -> MessagingResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE buyer_id = ? OR seller_id = ?
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(party_id)
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        rows.iter().map(map_conversation).collect()
    }

    /// Atomically update the denormalized last-message pointer. The single
    /// UPDATE statement serialises concurrent writers; no update is silently
    /// lost.
    pub async fn record_last_message(
        &self,
        conversation_id: i64,
        text: &str,
        sender_id: i64,
    ) -> MessagingResult<Conversation> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            "UPDATE conversations
             SET last_message_text = ?, last_sender_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(text)
        .bind(sender_id)
        .bind(now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(MessagingError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }

        self.find_by_id(conversation_id).await?.ok_or_else(|| {
            MessagingError::NotFound(format!("conversation {conversation_id}"))
        })
    }
}

fn map_conversation(row: &SqliteRow) -> MessagingResult<Conversation> {
    Ok(Conversation {
        id: row
            .try_get("id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        buyer_id: row
            .try_get("buyer_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        seller_id: row
            .try_get("seller_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        last_message_text: row
            .try_get("last_message_text")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        last_sender_id: row
            .try_get("last_sender_id")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| MessagingError::Storage(e.to_string()))?,
    })
}

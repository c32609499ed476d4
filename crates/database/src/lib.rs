//! Tradepost Database Crate
//!
//! Durable state for the conversation relay: the conversation store (which
//! two parties are talking, plus a denormalized last-message pointer) and the
//! append-only message log. Presence is deliberately absent here; it lives in
//! memory in the messaging crate.

use sqlx::SqlitePool;
use tradepost_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

// Re-export repositories
pub use repos::{ConversationRepository, MessageRepository, PartyRepository};

// Re-export entities
pub use entities::{Conversation, Message, NewMessage, Party, PHOTO_MARKER};

// Re-export types
pub use types::{
    errors::{DatabaseError, MessagingError},
    DatabaseResult, MessagingResult,
};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(result.0);
    }
}

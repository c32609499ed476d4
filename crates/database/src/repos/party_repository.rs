//! Repository for party lookups.
//!
//! Parties are created by the account system; the messaging core only reads
//! them. `create` exists for seeding and tests.

use crate::entities::Party;
use crate::types::{MessagingError, MessagingResult};
use sqlx::{Row, SqlitePool};

pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> MessagingResult<Option<Party>> {
        let row = sqlx::query(
            "SELECT id, display_name, avatar_url, created_at FROM parties WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        row.map(|row| {
            Ok(Party {
                id: row
                    .try_get("id")
                    .map_err(|e| MessagingError::Storage(e.to_string()))?,
                display_name: row
                    .try_get("display_name")
                    .map_err(|e| MessagingError::Storage(e.to_string()))?,
                avatar_url: row
                    .try_get("avatar_url")
                    .map_err(|e| MessagingError::Storage(e.to_string()))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| MessagingError::Storage(e.to_string()))?,
            })
        })
        .transpose()
    }

    pub async fn create(
        &self,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> MessagingResult<Party> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            "INSERT INTO parties (display_name, avatar_url, created_at) VALUES (?, ?, ?)",
        )
        .bind(display_name)
        .bind(avatar_url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::Storage(e.to_string()))?;

        Ok(Party {
            id: result.last_insert_rowid(),
            display_name: display_name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::prepare_database;
    use crate::migrations::run_migrations;
    use tempfile::TempDir;
    use tradepost_config::DatabaseConfig;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_parties.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn create_and_find_party() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = PartyRepository::new(pool);

        let created = repo.create("Ada", Some("https://cdn/avatar.png")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.display_name, "Ada");
        assert_eq!(found.avatar_url.as_deref(), Some("https://cdn/avatar.png"));
    }

    #[tokio::test]
    async fn find_unknown_party_returns_none() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = PartyRepository::new(pool);

        assert!(repo.find_by_id(404).await.unwrap().is_none());
    }
}

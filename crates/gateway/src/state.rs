//! Shared application state for the gateway

use crate::error::{GatewayError, GatewayResult};
use sqlx::SqlitePool;
use std::sync::Arc;
use tradepost_config::DatabaseConfig;
use tradepost_messaging::{MessagingService, RelayHub};

/// Shared application state containing the relay hub and messaging service.
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Relay hub owning the presence registry
    pub relay: Arc<RelayHub>,
    /// Messaging service (send path, history, inbox)
    pub messaging: Arc<MessagingService>,
}

impl GatewayState {
    pub fn new(pool: SqlitePool) -> Self {
        let relay = Arc::new(RelayHub::new());
        let messaging = Arc::new(MessagingService::new(pool.clone(), relay.clone()));

        Self {
            pool,
            relay,
            messaging,
        }
    }

    /// Create gateway state from database configuration
    pub async fn from_config(config: &DatabaseConfig) -> GatewayResult<Self> {
        let pool = tradepost_database::initialize_database(config)
            .await
            .map_err(|e| {
                GatewayError::DatabaseError(format!("failed to initialize database: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    pub fn messaging(&self) -> &MessagingService {
        &self.messaging
    }

    pub fn relay(&self) -> &RelayHub {
        &self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_gateway_state() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("gateway_state.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let state = GatewayState::from_config(&config).await.unwrap();
        assert!(state.messaging().conversations_for(1).await.unwrap().is_empty());
        assert!(!state.relay().is_online(1).await);
    }
}

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use stepwise_core::config::DatabaseConfig;
use stepwise_core::error::{Result, StepwiseError};

use crate::store::PgStore;

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a connection pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StepwiseError::Persistence(format!("Failed to connect: {}", e)))?;

        debug!(pool_size = config.pool_size, "Database pool open");
        Ok(Self { pool })
    }

    /// Migration store backed by this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StepwiseError::Persistence(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_unreachable_is_persistence_error() {
        let config = DatabaseConfig {
            url: "postgres://stepwise@127.0.0.1:1/none".to_string(),
            pool_size: 1,
            pool_timeout_secs: 1,
        };

        let result = Database::connect(&config).await;
        assert!(matches!(result, Err(StepwiseError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_health_check_reports_unreachable_server() {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://stepwise@127.0.0.1:1/none")
            .unwrap();
        let db = Database { pool };

        let err = db.health_check().await.unwrap_err();
        assert!(matches!(err, StepwiseError::Persistence(_)));
        assert!(err.to_string().contains("Health check failed"));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };

        assert!(Database::connect(&config).await.is_err());
    }
}

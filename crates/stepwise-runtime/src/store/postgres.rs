use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::OnceCell;
use tracing::debug;

use stepwise_core::{BoxFuture, Result, StepwiseError};

use super::MigrationStore;

/// Table holding the settings rows (including the version record).
pub const SETTINGS_TABLE: &str = "stepwise_settings";

/// Lock ID for the run advisory lock, "STEPWISE" in ascii.
const RUN_LOCK_ID: i64 = 0x5354_4550_5749_5345;

/// Scope type for PostgreSQL-backed migrations.
pub type PgScope = Transaction<'static, Postgres>;

/// PostgreSQL backend.
///
/// The run lock pins one pooled connection for the whole run, so the pool
/// needs at least two connections while the lock is in use.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_settings_table(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS stepwise_settings (
                        key TEXT PRIMARY KEY,
                        value JSONB,
                        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    )
                    "#,
                )
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    StepwiseError::Persistence(format!("Failed to create settings table: {}", e))
                })?;
                debug!(table = SETTINGS_TABLE, "Settings table ready");
                Ok::<_, StepwiseError>(())
            })
            .await?;
        Ok(())
    }
}

impl MigrationStore for PgStore {
    type Scope = PgScope;
    type Lock = PoolConnection<Postgres>;

    fn begin(&self) -> BoxFuture<'_, Result<PgScope>> {
        Box::pin(async move {
            self.pool.begin().await.map_err(|e| {
                StepwiseError::Persistence(format!("Failed to begin transaction: {}", e))
            })
        })
    }

    fn commit(&self, scope: PgScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            scope
                .commit()
                .await
                .map_err(|e| StepwiseError::Persistence(format!("Failed to commit: {}", e)))
        })
    }

    fn rollback(&self, scope: PgScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            scope
                .rollback()
                .await
                .map_err(|e| StepwiseError::Persistence(format!("Failed to roll back: {}", e)))
        })
    }

    fn load_or_init_setting<'a>(
        &'a self,
        key: &'a str,
        default: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            self.ensure_settings_table().await?;

            sqlx::query(
                "INSERT INTO stepwise_settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
            )
            .bind(key)
            .bind(&default)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StepwiseError::Persistence(format!("Failed to initialise setting '{}': {}", key, e))
            })?;

            let value: Option<serde_json::Value> =
                sqlx::query_scalar("SELECT value FROM stepwise_settings WHERE key = $1")
                    .bind(key)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        StepwiseError::Persistence(format!("Failed to read setting '{}': {}", key, e))
                    })?;

            Ok(value.unwrap_or(serde_json::Value::Null))
        })
    }

    fn store_setting<'a>(
        &'a self,
        scope: &'a mut PgScope,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO stepwise_settings (key, value, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(&value)
            .execute(&mut **scope)
            .await
            .map_err(|e| {
                StepwiseError::Persistence(format!("Failed to write setting '{}': {}", key, e))
            })?;
            Ok(())
        })
    }

    fn lock(&self) -> BoxFuture<'_, Result<PoolConnection<Postgres>>> {
        Box::pin(async move {
            let max = self.pool.options().get_max_connections();
            if max < 2 {
                return Err(StepwiseError::Config(format!(
                    "Run lock needs a pool of at least 2 connections, got {}",
                    max
                )));
            }
            debug!("Acquiring migration lock...");
            // Session-level lock: it must be released on the same connection.
            let mut conn = self.pool.acquire().await.map_err(|e| {
                StepwiseError::Persistence(format!("Failed to acquire lock connection: {}", e))
            })?;
            sqlx::query("SELECT pg_advisory_lock($1)")
                .bind(RUN_LOCK_ID)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    StepwiseError::Persistence(format!("Failed to acquire migration lock: {}", e))
                })?;
            debug!("Migration lock acquired");
            Ok(conn)
        })
    }

    fn unlock(&self, mut conn: PoolConnection<Postgres>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let released = sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(RUN_LOCK_ID)
                .execute(&mut *conn)
                .await;
            match released {
                Ok(_) => {
                    debug!("Migration lock released");
                    Ok(())
                }
                Err(e) => {
                    // Closing the session drops any lock it still holds.
                    drop(conn.detach());
                    Err(StepwiseError::Persistence(format!(
                        "Failed to release migration lock: {}",
                        e
                    )))
                }
            }
        })
    }
}

use super::migrations::{self, MigrationOutcome};
use crate::shared::config::DatabaseConfig;
use crate::shared::error::AppError;
use futures::future::BoxFuture;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// 埋め込みDBへの唯一の入口。起動時に一度だけ生成して各サービスへ渡す
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Arc<SqlitePool>,
}

impl ConnectionPool {
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, AppError> {
        Self::connect(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.busy_timeout_secs),
        )
        .await
    }

    pub async fn from_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:", 1, Duration::from_secs(5)).await
    }

    async fn connect(
        database_url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, AppError> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Full);
        }

        // インメモリDBは接続ごとに別物になるため1本に固定し、破棄もしない
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent. Brings the schema to the latest version or fails without
    /// leaving a partially migrated store behind.
    pub async fn initialize(&self) -> Result<MigrationOutcome, AppError> {
        let outcome = migrations::run(&self.pool).await?;
        if outcome.applied.is_empty() {
            tracing::debug!(version = outcome.current_version, "schema already up to date");
        } else {
            tracing::info!(
                from = outcome.previous_version,
                to = outcome.current_version,
                applied = outcome.applied.len(),
                "schema migrated"
            );
        }
        Ok(outcome)
    }

    pub async fn schema_version(&self) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        migrations::read_version(&mut conn).await
    }

    /// `body` runs between BEGIN and COMMIT. Any error rolls back and is
    /// returned unchanged.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>> + Send,
    {
        let mut tx = self.pool.begin().await?;

        match body(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let pool = ConnectionPool::from_memory().await.unwrap();

        let first = pool.initialize().await.unwrap();
        assert_eq!(first.previous_version, 0);
        assert_eq!(first.current_version, migrations::LATEST_VERSION);

        let second = pool.initialize().await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(pool.schema_version().await.unwrap(), migrations::LATEST_VERSION);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.initialize().await.unwrap();

        let result: Result<(), AppError> = pool
            .transaction(|conn| {
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO kv_cache (key, value, created_at, updated_at) VALUES ('k', 'v', 0, 0)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    Err(AppError::Internal("boom".into()))
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::Internal(msg)) if msg == "boom"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_cache")
            .fetch_one(pool.get_pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.initialize().await.unwrap();

        let inserted = pool
            .transaction(|conn| {
                Box::pin(async move {
                    let result = sqlx::query(
                        "INSERT INTO kv_cache (key, value, created_at, updated_at) VALUES ('k', 'v', 0, 0)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    Ok(result.rows_affected())
                })
            })
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_cache")
            .fetch_one(pool.get_pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}

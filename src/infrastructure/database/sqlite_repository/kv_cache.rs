use super::SqliteRepository;
use super::mapper::cache_entry_from_row;
use super::queries::{
    CLEAR_CACHE, DELETE_CACHE_ENTRY, DELETE_EXPIRED_CACHE_ENTRIES, DELETE_EXPIRED_CACHE_ENTRY,
    SELECT_CACHE_ENTRY, UPSERT_CACHE_ENTRY,
};
use super::rows::CacheRow;
use crate::application::ports::repositories::CacheRepository;
use crate::domain::entities::CacheEntry;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
impl CacheRepository for SqliteRepository {
    async fn get_entry(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, AppError> {
        let row = sqlx::query_as::<_, CacheRow>(SELECT_CACHE_ENTRY)
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;

        let Some(entry) = row.map(cache_entry_from_row).transpose()? else {
            return Ok(None);
        };

        if entry.is_expired(now) {
            sqlx::query(DELETE_EXPIRED_CACHE_ENTRY)
                .bind(key)
                .bind(now.timestamp_millis())
                .execute(self.pool.get_pool())
                .await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn put_entry(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(UPSERT_CACHE_ENTRY)
            .bind(key)
            .bind(value)
            .bind(expires_at.map(|at| at.timestamp_millis()))
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> Result<bool, AppError> {
        let result = sqlx::query(DELETE_CACHE_ENTRY)
            .bind(key)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<u64, AppError> {
        let result = sqlx::query(CLEAR_CACHE)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_EXPIRED_CACHE_ENTRIES)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}

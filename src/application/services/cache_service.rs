use crate::application::ports::repositories::CacheRepository;
use crate::domain::value_objects::CacheKey;
use crate::shared::error::AppError;
use crate::shared::time::checked_after;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// 割り当て一覧やアンケート定義など、読み取り中心のリモートデータのキャッシュ
pub struct CacheService {
    cache: Arc<dyn CacheRepository>,
    default_ttl: Duration,
}

impl CacheService {
    pub fn new(cache: Arc<dyn CacheRepository>, default_ttl: Duration) -> Self {
        Self { cache, default_ttl }
    }

    /// Never fails: storage or decoding problems are logged and read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = match self.cache.get_entry(key.as_str(), Utc::now()).await {
            Ok(entry) => entry?,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cached value could not be decoded");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> Result<(), AppError> {
        self.set_with_expiry(key, value, Some(self.default_ttl)).await
    }

    /// `ttl = None` keeps the entry until it is deleted or cleared.
    pub async fn set_with_expiry<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        let now = Utc::now();
        let expires_at = ttl
            .map(|ttl| checked_after(now, ttl, "Cache ttl"))
            .transpose()?;

        self.cache.put_entry(key.as_str(), &raw, expires_at, now).await
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool, AppError> {
        self.cache.delete_entry(key.as_str()).await
    }

    pub async fn clear(&self) -> Result<u64, AppError> {
        self.cache.clear().await
    }

    pub async fn cleanup_expired(&self) -> Result<u64, AppError> {
        self.cache.delete_expired(Utc::now()).await
    }
}

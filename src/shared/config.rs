use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// 日時演算が溢れない範囲に収める上限
const MAX_RETENTION_DAYS: u32 = 10 * 365;
const MAX_DELAY_SECS: u64 = 10 * 365 * 24 * 60 * 60;
const MAX_BACKOFF_CEILING_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub max_retries: u32,
    pub batch_size: u32,
    pub backoff_ceiling_secs: u64,
    pub completed_retention_days: u32,
    // 参照メディアが未アップロードの回答は送信を保留する
    pub require_media_uploaded: bool,
    pub readiness_defer_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub file_retention_hours: u64,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub submission_path: String,
    pub upload_ticket_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database: DatabaseConfig {
                url: format!("sqlite:{}/fieldsync.db", data_dir),
                max_connections: 1,
                busy_timeout_secs: 5,
            },
            sync: SyncConfig::default(),
            storage: StorageConfig {
                data_dir,
                file_retention_hours: 72,
                cache_ttl_secs: 3600, // 1 hour
            },
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                request_timeout_secs: 30,
                submission_path: "/api/v1/responses/batch".to_string(),
                upload_ticket_path: "/api/v1/uploads/ticket".to_string(),
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_secs: 300, // 5 minutes
            max_retries: 5,
            batch_size: 20,
            backoff_ceiling_secs: 24 * 60 * 60,
            completed_retention_days: 7,
            require_media_uploaded: true,
            readiness_defer_secs: 60,
        }
    }
}

impl SyncConfig {
    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn file_retention(&self) -> Duration {
        Duration::from_secs(self.file_retention_hours.saturating_mul(60 * 60))
    }
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("fieldsync"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .into_owned()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FIELDSYNC_DATA_DIR") {
            let v = v.trim().to_string();
            if !v.is_empty() {
                cfg.database.url = format!("sqlite:{}/fieldsync.db", v);
                cfg.storage.data_dir = v;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_u32("FIELDSYNC_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.max(1);
        }

        if let Ok(v) = std::env::var("FIELDSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("FIELDSYNC_SYNC_INTERVAL_SECS") {
            cfg.sync.sync_interval_secs = value.max(1);
        }
        if let Some(value) = env_u32("FIELDSYNC_MAX_RETRIES") {
            cfg.sync.max_retries = value;
        }
        if let Some(value) = env_u32("FIELDSYNC_BATCH_SIZE") {
            cfg.sync.batch_size = value.max(1);
        }
        if let Some(value) = env_u64("FIELDSYNC_BACKOFF_CEILING_SECS") {
            cfg.sync.backoff_ceiling_secs = value;
        }
        if let Some(value) = env_u32("FIELDSYNC_COMPLETED_RETENTION_DAYS") {
            cfg.sync.completed_retention_days = value;
        }
        if let Ok(v) = std::env::var("FIELDSYNC_REQUIRE_MEDIA_UPLOADED") {
            cfg.sync.require_media_uploaded = parse_bool(&v, cfg.sync.require_media_uploaded);
        }
        if let Some(value) = env_u64("FIELDSYNC_READINESS_DEFER_SECS") {
            cfg.sync.readiness_defer_secs = value.max(1);
        }

        if let Some(value) = env_u64("FIELDSYNC_FILE_RETENTION_HOURS") {
            cfg.storage.file_retention_hours = value;
        }
        if let Some(value) = env_u64("FIELDSYNC_CACHE_TTL_SECS") {
            cfg.storage.cache_ttl_secs = value;
        }

        if let Ok(v) = std::env::var("FIELDSYNC_API_BASE_URL") {
            if !v.trim().is_empty() {
                cfg.api.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(value) = env_u64("FIELDSYNC_API_TIMEOUT_SECS") {
            cfg.api.request_timeout_secs = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.sync.backoff_ceiling_secs < 60 {
            return Err("Sync backoff_ceiling_secs must be at least 60".to_string());
        }
        if self.sync.backoff_ceiling_secs > MAX_BACKOFF_CEILING_SECS {
            return Err(format!(
                "Sync backoff_ceiling_secs must be at most {MAX_BACKOFF_CEILING_SECS}"
            ));
        }
        if self.sync.readiness_defer_secs > MAX_DELAY_SECS {
            return Err(format!("Sync readiness_defer_secs must be at most {MAX_DELAY_SECS}"));
        }
        if self.sync.completed_retention_days > MAX_RETENTION_DAYS {
            return Err(format!(
                "Sync completed_retention_days must be at most {MAX_RETENTION_DAYS}"
            ));
        }
        if self.storage.file_retention_hours > u64::from(MAX_RETENTION_DAYS) * 24 {
            return Err(format!(
                "Storage file_retention_hours must be at most {}",
                u64::from(MAX_RETENTION_DAYS) * 24
            ));
        }
        if self.storage.cache_ttl_secs > MAX_DELAY_SECS {
            return Err(format!("Storage cache_ttl_secs must be at most {MAX_DELAY_SECS}"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err("Api base_url must not be empty".to_string());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn env_u32(key: &str) -> Option<u32> {
    env_u64(key).and_then(|v| u32::try_from(v).ok())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

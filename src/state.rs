use crate::application::ports::{SubmissionGateway, UploadGateway};
use crate::application::services::{
    CacheService, FileService, ResponseService, RetryScheduler, SchedulerSettings,
    SyncQueueService, UploadService,
};
use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
use crate::infrastructure::storage::FileStore;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;

/// 起動時に一度だけ組み立てる、ストアと同期エンジン全体の状態
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub response_service: Arc<ResponseService>,
    pub file_service: Arc<FileService>,
    pub upload_service: Arc<UploadService>,
    pub sync_queue_service: Arc<SyncQueueService>,
    pub cache_service: Arc<CacheService>,
    pub scheduler: Arc<RetryScheduler>,
}

/// 起動時の復旧処理で戻した件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub queue_items: u64,
    pub uploads: u64,
    pub responses: u64,
}

impl AppState {
    /// Opens the store and brings the schema up to date. A failed migration
    /// stops startup; nothing runs against a half-migrated store.
    pub async fn new(
        config: AppConfig,
        submissions: Arc<dyn SubmissionGateway>,
        uploads: Arc<dyn UploadGateway>,
    ) -> Result<Self, AppError> {
        let data_dir = config.storage.data_path();
        std::fs::create_dir_all(&data_dir)?;

        let pool = ConnectionPool::from_config(&config.database).await?;
        let outcome = pool.initialize().await?;
        tracing::info!(
            version = outcome.current_version,
            data_dir = %data_dir.display(),
            "store opened"
        );

        let state = Self::assemble(config, pool, submissions, uploads);
        state.recover().await?;
        Ok(state)
    }

    fn assemble(
        config: AppConfig,
        pool: ConnectionPool,
        submissions: Arc<dyn SubmissionGateway>,
        uploads: Arc<dyn UploadGateway>,
    ) -> Self {
        let repository = Arc::new(SqliteRepository::new(pool.clone()));
        let file_store = FileStore::new(config.storage.data_path());
        let max_retries = config.sync.max_retries;

        let sync_queue_service = Arc::new(SyncQueueService::new(
            repository.clone(),
            config.sync.backoff_ceiling(),
        ));
        let response_service = Arc::new(ResponseService::new(
            repository.clone(),
            file_store.clone(),
            max_retries,
        ));
        let file_service = Arc::new(FileService::new(
            repository.clone(),
            file_store.clone(),
            max_retries,
        ));
        let upload_service = Arc::new(UploadService::new(
            repository.clone(),
            uploads,
            file_store,
        ));
        let cache_service = Arc::new(CacheService::new(
            repository,
            Duration::from_secs(config.storage.cache_ttl_secs),
        ));

        let scheduler = Arc::new(RetryScheduler::new(
            sync_queue_service.clone(),
            response_service.clone(),
            file_service.clone(),
            upload_service.clone(),
            cache_service.clone(),
            submissions,
            SchedulerSettings::from_config(&config),
        ));

        Self {
            config,
            pool,
            response_service,
            file_service,
            upload_service,
            sync_queue_service,
            cache_service,
            scheduler,
        }
    }

    /// 中断された processing/uploading/syncing を pending に戻す
    pub async fn recover(&self) -> Result<RecoveryReport, AppError> {
        let report = RecoveryReport {
            queue_items: self.sync_queue_service.recover_processing().await?,
            uploads: self.file_service.recover_interrupted_uploads().await?,
            responses: self.response_service.recover_interrupted_syncs().await?,
        };
        if report != RecoveryReport::default() {
            tracing::warn!(
                queue_items = report.queue_items,
                uploads = report.uploads,
                responses = report.responses,
                "recovered work interrupted by previous shutdown"
            );
        }
        Ok(report)
    }

    /// Starts the background scheduler if auto sync is enabled.
    pub fn start_auto_sync(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.sync.auto_sync {
            tracing::info!("auto sync disabled");
            return None;
        }
        let interval = self.config.sync.sync_interval();
        tracing::info!(interval_secs = interval.as_secs(), "auto sync started");
        Some(self.scheduler.clone().spawn(interval))
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

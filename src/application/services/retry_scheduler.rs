use super::{CacheService, FileService, ResponseService, SyncQueueService, UploadService};
use crate::application::ports::{
    SubmissionAnswer, SubmissionGateway, SubmissionItem, SubmissionItemResult, SubmissionStatus,
};
use crate::domain::entities::{LocalFile, SurveyResponse, SyncQueueItem};
use crate::domain::value_objects::{
    LocalFileId, ResponseId, ResponseStatus, SyncOperationType, SyncQueueId,
};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "sync::scheduler";
const MAINTENANCE_EVERY_PASSES: u64 = 12;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub batch_size: u32,
    pub require_media_uploaded: bool,
    pub readiness_defer: Duration,
    pub completed_retention_days: u32,
    pub file_retention: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.sync.batch_size,
            require_media_uploaded: config.sync.require_media_uploaded,
            readiness_defer: Duration::from_secs(config.sync.readiness_defer_secs),
            completed_retention_days: config.sync.completed_retention_days,
            file_retention: config.storage.file_retention(),
        }
    }
}

/// 1回のパスの結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncRunReport {
    /// 別のパスが実行中だったため何もしなかった
    pub skipped: bool,
    pub claimed: u32,
    pub uploaded: u32,
    pub upload_failures: u32,
    pub submitted: u32,
    pub duplicates: u32,
    pub rejected: u32,
    pub submission_failures: u32,
    pub deferred: u32,
    /// ストアのエラーで中断し、キューに戻した項目
    pub aborted: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub completed_removed: u64,
    pub files_purged: u64,
    pub cache_evicted: u64,
}

struct PreparedSubmission {
    item: SyncQueueItem,
    response: SurveyResponse,
    files: Vec<LocalFile>,
}

/// キューの期限到来ジョブを処理する唯一の経路。送信ゲートウェイはここだけが持つ
pub struct RetryScheduler {
    queue: Arc<SyncQueueService>,
    responses: Arc<ResponseService>,
    files: Arc<FileService>,
    uploads: Arc<UploadService>,
    cache: Arc<CacheService>,
    submissions: Arc<dyn SubmissionGateway>,
    settings: SchedulerSettings,
    running: Mutex<()>,
}

impl RetryScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<SyncQueueService>,
        responses: Arc<ResponseService>,
        files: Arc<FileService>,
        uploads: Arc<UploadService>,
        cache: Arc<CacheService>,
        submissions: Arc<dyn SubmissionGateway>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            queue,
            responses,
            files,
            uploads,
            cache,
            submissions,
            settings,
            running: Mutex::new(()),
        }
    }

    /// One pass over the due queue items. Uploads are handled one at a
    /// time in queue order, then every ready response goes out in a single
    /// batch. Returns a skipped report if another pass is still running.
    pub async fn run_once(&self) -> Result<SyncRunReport, AppError> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!(target: LOG_TARGET, "previous pass still running");
            return Ok(SyncRunReport {
                skipped: true,
                ..Default::default()
            });
        };

        let mut report = SyncRunReport::default();
        // 前のパスが途中で止まった分をここで戻す。ガード取得後なので他に処理中の項目は無い
        self.recover_stranded().await?;

        let due = self
            .queue
            .get_pending_operations(self.settings.batch_size)
            .await?;

        let mut batch = Vec::new();
        for item in due {
            match self.queue.claim(item.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, queue_id = %item.id, error = %e, "failed to claim item");
                    continue;
                }
            }
            report.claimed += 1;

            let id = item.id;
            match self.dispatch(item, &mut report).await {
                Ok(Some(prepared)) => batch.push(prepared),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, queue_id = %id, error = %e, "item aborted");
                    self.release(id, &e).await;
                    report.aborted += 1;
                }
            }
        }

        if !batch.is_empty() {
            self.submit(batch, &mut report).await;
        }

        tracing::info!(
            target: LOG_TARGET,
            claimed = report.claimed,
            uploaded = report.uploaded,
            upload_failures = report.upload_failures,
            submitted = report.submitted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            submission_failures = report.submission_failures,
            deferred = report.deferred,
            aborted = report.aborted,
            "sync pass finished"
        );
        Ok(report)
    }

    pub async fn run_maintenance(&self) -> Result<MaintenanceReport, AppError> {
        let report = MaintenanceReport {
            completed_removed: self
                .queue
                .cleanup_completed(self.settings.completed_retention_days)
                .await?,
            files_purged: self
                .files
                .purge_uploaded_content(self.settings.file_retention)
                .await?,
            cache_evicted: self.cache.cleanup_expired().await?,
        };
        tracing::info!(
            target: LOG_TARGET,
            completed_removed = report.completed_removed,
            files_purged = report.files_purged,
            cache_evicted = report.cache_evicted,
            "maintenance finished"
        );
        Ok(report)
    }

    /// Runs a pass on every tick, plus maintenance every few passes.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut passes: u64 = 0;

            loop {
                ticker.tick().await;

                if let Err(e) = self.run_once().await {
                    tracing::error!(target: LOG_TARGET, error = %e, "sync pass failed");
                }

                passes += 1;
                if passes % MAINTENANCE_EVERY_PASSES == 0 {
                    if let Err(e) = self.run_maintenance().await {
                        tracing::error!(target: LOG_TARGET, error = %e, "maintenance failed");
                    }
                }
            }
        })
    }

    async fn recover_stranded(&self) -> Result<(), AppError> {
        let queue_items = self.queue.recover_processing().await?;
        let uploads = self.files.recover_interrupted_uploads().await?;
        let responses = self.responses.recover_interrupted_syncs().await?;
        if queue_items + uploads + responses > 0 {
            tracing::warn!(
                target: LOG_TARGET,
                queue_items,
                uploads,
                responses,
                "released work left over from an earlier pass"
            );
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        item: SyncQueueItem,
        report: &mut SyncRunReport,
    ) -> Result<Option<PreparedSubmission>, AppError> {
        match item.operation_type.clone() {
            SyncOperationType::UploadFile => {
                self.process_upload(&item, report).await?;
                Ok(None)
            }
            SyncOperationType::SubmitResponse => self.prepare_submission(item, report).await,
            SyncOperationType::Unknown(operation) => {
                let message = format!("Unsupported operation type: {operation}");
                self.queue.mark_as_failed(item.id, &message, false).await?;
                Ok(None)
            }
        }
    }

    /// processing のまま残さない。失敗しても次のパス開始時に回収される
    async fn release(&self, id: SyncQueueId, err: &AppError) {
        if let Err(e) = self
            .queue
            .mark_as_failed(id, &err.to_string(), err.is_transient())
            .await
        {
            tracing::error!(target: LOG_TARGET, queue_id = %id, error = %e, "failed to release item");
        }
    }

    async fn process_upload(
        &self,
        item: &SyncQueueItem,
        report: &mut SyncRunReport,
    ) -> Result<(), AppError> {
        let file_id = match LocalFileId::new(item.entity_id.clone()) {
            Ok(id) => id,
            Err(message) => {
                self.queue.mark_as_failed(item.id, &message, false).await?;
                report.upload_failures += 1;
                return Ok(());
            }
        };

        match self.uploads.upload_file(&file_id).await {
            Ok(_) => {
                self.queue.mark_as_completed(item.id).await?;
                report.uploaded += 1;
            }
            Err(err) => {
                self.queue
                    .mark_as_failed(item.id, &err.to_string(), err.is_transient())
                    .await?;
                report.upload_failures += 1;
            }
        }
        Ok(())
    }

    async fn prepare_submission(
        &self,
        item: SyncQueueItem,
        report: &mut SyncRunReport,
    ) -> Result<Option<PreparedSubmission>, AppError> {
        let response_id = match ResponseId::new(item.entity_id.clone()) {
            Ok(id) => id,
            Err(message) => {
                self.queue.mark_as_failed(item.id, &message, false).await?;
                report.submission_failures += 1;
                return Ok(None);
            }
        };

        let Some(response) = self.responses.get_response_by_id(&response_id).await? else {
            let message = format!("Response {response_id} not found");
            self.queue.mark_as_failed(item.id, &message, false).await?;
            report.submission_failures += 1;
            return Ok(None);
        };

        // 以前のパスで受理済み（完了記録の前に落ちた場合など）
        if response.is_synced() {
            self.queue.mark_as_completed(item.id).await?;
            return Ok(None);
        }
        if response.status != ResponseStatus::Completed {
            let message = format!("Response {response_id} is {}", response.status);
            self.queue.mark_as_failed(item.id, &message, false).await?;
            report.submission_failures += 1;
            return Ok(None);
        }

        let files = self.files.list_for_response(&response_id).await?;
        if self.settings.require_media_uploaded {
            let waiting = files.iter().filter(|f| !f.is_uploaded()).count();
            if waiting > 0 {
                let reason = format!("Waiting for {waiting} media file(s) to upload");
                self.queue
                    .defer(item.id, self.settings.readiness_defer, &reason)
                    .await?;
                tracing::debug!(
                    target: LOG_TARGET,
                    response_id = %response_id,
                    waiting,
                    "submission deferred"
                );
                report.deferred += 1;
                return Ok(None);
            }
        }

        self.responses.mark_syncing(&response_id).await?;
        Ok(Some(PreparedSubmission {
            item,
            response,
            files,
        }))
    }

    async fn submit(&self, batch: Vec<PreparedSubmission>, report: &mut SyncRunReport) {
        let items: Vec<SubmissionItem> = batch
            .iter()
            .map(|p| build_submission_item(&p.response, &p.files))
            .collect();

        let result = match self.submissions.submit_batch(&items).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    count = batch.len(),
                    error = %err,
                    "batch submission failed"
                );
                for prepared in &batch {
                    self.release_submission(prepared, &err).await;
                    report.submission_failures += 1;
                }
                return;
            }
        };

        for prepared in &batch {
            let outcome = result.result_for(prepared.response.id.as_str());
            if let Err(e) = self.apply_outcome(prepared, outcome, report).await {
                tracing::warn!(
                    target: LOG_TARGET,
                    response_id = %prepared.response.id,
                    error = %e,
                    "failed to record submission result"
                );
                self.release_submission(prepared, &e).await;
                report.aborted += 1;
            }
        }
    }

    async fn apply_outcome(
        &self,
        prepared: &PreparedSubmission,
        outcome: Option<&SubmissionItemResult>,
        report: &mut SyncRunReport,
    ) -> Result<(), AppError> {
        let response_id = &prepared.response.id;
        match outcome {
            Some(outcome) if outcome.status.is_accepted() => {
                self.responses
                    .mark_as_synced(response_id, outcome.response_id.as_deref())
                    .await?;
                self.queue.mark_as_completed(prepared.item.id).await?;
                if outcome.status == SubmissionStatus::Duplicate {
                    report.duplicates += 1;
                } else {
                    report.submitted += 1;
                }
            }
            Some(outcome) if outcome.status == SubmissionStatus::Failed => {
                let message = outcome.failure_summary();
                self.responses.mark_sync_error(response_id, &message).await?;
                self.queue
                    .mark_as_failed(prepared.item.id, &message, false)
                    .await?;
                report.rejected += 1;
            }
            Some(outcome) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    response_id = %response_id,
                    status = ?outcome.status,
                    "unrecognised submission status"
                );
                let err = AppError::Network(format!(
                    "Unrecognised submission status for {response_id}"
                ));
                self.release_submission(prepared, &err).await;
                report.submission_failures += 1;
            }
            None => {
                let err =
                    AppError::Network(format!("No submission result returned for {response_id}"));
                self.release_submission(prepared, &err).await;
                report.submission_failures += 1;
            }
        }
        Ok(())
    }

    /// 回答のエラー記録とキューへの返却は互いに独立して試みる
    async fn release_submission(&self, prepared: &PreparedSubmission, err: &AppError) {
        if let Err(e) = self
            .responses
            .mark_sync_error(&prepared.response.id, &err.to_string())
            .await
        {
            tracing::error!(
                target: LOG_TARGET,
                response_id = %prepared.response.id,
                error = %e,
                "failed to record sync error"
            );
        }
        self.release(prepared.item.id, err).await;
    }
}

/// Answers whose question has an uploaded file carry that file's URL.
pub fn build_submission_item(response: &SurveyResponse, files: &[LocalFile]) -> SubmissionItem {
    let answers = response
        .answers
        .iter()
        .map(|(question_id, value)| SubmissionAnswer {
            question_id: question_id.clone(),
            answer_value: value.clone(),
            answered_at: response.updated_at,
            media_url: files
                .iter()
                .filter(|f| f.question_id == *question_id && f.is_uploaded())
                .find_map(|f| f.remote.as_ref().map(|remote| remote.url.clone())),
        })
        .collect();

    SubmissionItem {
        client_id: response.id.to_string(),
        version_id: response.survey_version.clone(),
        started_at: response.started_at,
        completed_at: response.completed_at.unwrap_or(response.updated_at),
        location: response.location.clone(),
        device_info: response.device_info.clone(),
        answers,
    }
}

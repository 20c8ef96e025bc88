use crate::domain::entities::{
    CacheEntry, FileContent, LocalFile, QueueSummary, RemoteObject, SurveyResponse, SyncQueueItem,
    SyncQueueItemDraft,
};
use crate::domain::value_objects::{
    AnswerMap, LocalFileId, ResponseId, ResponseStatus, SyncQueueId, SyncQueueStatus,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[async_trait]
pub trait ResponseRepository: Send + Sync {
    async fn insert_response(&self, response: &SurveyResponse) -> Result<(), AppError>;

    /// 回答マップ全体を上書きする（差分マージはしない）
    async fn update_answers(
        &self,
        id: &ResponseId,
        answers: &AnswerMap,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// 完了への遷移と送信ジョブの登録を同一トランザクションで行う
    async fn complete_and_enqueue(
        &self,
        id: &ResponseId,
        completed_at: DateTime<Utc>,
        duration_seconds: i64,
        job: SyncQueueItemDraft,
    ) -> Result<SyncQueueId, AppError>;

    async fn get_response(&self, id: &ResponseId) -> Result<Option<SurveyResponse>, AppError>;

    async fn list_responses_by_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SurveyResponse>, AppError>;

    async fn list_pending_sync_responses(&self) -> Result<Vec<SurveyResponse>, AppError>;

    async fn mark_syncing(&self, id: &ResponseId) -> Result<(), AppError>;

    /// Returns false when the response is not in `completed` state.
    async fn mark_synced(
        &self,
        id: &ResponseId,
        remote_response_id: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn mark_sync_error(&self, id: &ResponseId, message: &str) -> Result<(), AppError>;

    async fn apply_review(
        &self,
        id: &ResponseId,
        status: ResponseStatus,
        content_hash: Option<&str>,
        immutable: bool,
    ) -> Result<(), AppError>;

    /// 未同期の下書きとその添付・キュー項目を削除し、削除した添付の中身を返す
    async fn delete_draft(&self, id: &ResponseId) -> Result<Vec<FileContent>, AppError>;

    async fn reset_interrupted_syncs(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait LocalFileRepository: Send + Sync {
    /// 添付の登録とアップロードジョブの登録を同一トランザクションで行う
    async fn insert_file_and_enqueue(
        &self,
        file: &LocalFile,
        job: SyncQueueItemDraft,
    ) -> Result<SyncQueueId, AppError>;

    async fn get_file(&self, id: &LocalFileId) -> Result<Option<LocalFile>, AppError>;

    async fn list_files_for_response(
        &self,
        response_id: &ResponseId,
    ) -> Result<Vec<LocalFile>, AppError>;

    async fn list_uploadable_files(&self, limit: u32) -> Result<Vec<LocalFile>, AppError>;

    async fn mark_uploading(&self, id: &LocalFileId) -> Result<(), AppError>;

    /// Object identity and status are written by a single statement.
    async fn mark_uploaded(
        &self,
        id: &LocalFileId,
        remote: &RemoteObject,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn mark_upload_error(&self, id: &LocalFileId, message: &str) -> Result<(), AppError>;

    async fn attach_extraction(&self, id: &LocalFileId, extraction: &Value)
    -> Result<(), AppError>;

    async fn list_purgeable_files(
        &self,
        uploaded_before: DateTime<Utc>,
    ) -> Result<Vec<LocalFile>, AppError>;

    async fn mark_content_purged(
        &self,
        id: &LocalFileId,
        purged_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn reset_interrupted_uploads(&self) -> Result<u64, AppError>;
}

/// 失敗時の遷移先（バックオフ計算済み）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTransition {
    pub status: SyncQueueStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SyncQueueRepository: Send + Sync {
    async fn enqueue(&self, draft: SyncQueueItemDraft) -> Result<SyncQueueId, AppError>;

    async fn get_item(&self, id: SyncQueueId) -> Result<Option<SyncQueueItem>, AppError>;

    /// `pending` かつ再試行時刻を過ぎた項目を優先度・作成順で返す
    async fn get_pending_operations(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncQueueItem>, AppError>;

    async fn list_by_status(
        &self,
        status: SyncQueueStatus,
        limit: u32,
    ) -> Result<Vec<SyncQueueItem>, AppError>;

    /// pending → processing. Returns false if another pass got there first.
    async fn claim(&self, id: SyncQueueId, now: DateTime<Utc>) -> Result<bool, AppError>;

    async fn record_failure(
        &self,
        id: SyncQueueId,
        transition: &FailureTransition,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn mark_completed(&self, id: SyncQueueId, now: DateTime<Utc>) -> Result<(), AppError>;

    async fn defer(
        &self,
        id: SyncQueueId,
        until: DateTime<Utc>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn retry_failed(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    async fn cleanup_completed(&self, completed_before: DateTime<Utc>) -> Result<u64, AppError>;

    async fn recover_processing(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    async fn summary(&self) -> Result<QueueSummary, AppError>;
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// 期限切れの行は読み出し時に削除して None を返す
    async fn get_entry(&self, key: &str, now: DateTime<Utc>)
    -> Result<Option<CacheEntry>, AppError>;

    async fn put_entry(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn delete_entry(&self, key: &str) -> Result<bool, AppError>;

    async fn clear(&self) -> Result<u64, AppError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

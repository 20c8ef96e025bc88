use super::SqliteRepository;
use super::mapper::queue_item_from_row;
use super::queries::{
    CLAIM_SYNC_QUEUE_ITEM, CLEANUP_COMPLETED_SYNC_QUEUE_ITEMS, COMPLETE_SYNC_QUEUE_ITEM,
    COUNT_SYNC_QUEUE_BY_STATUS, DEFER_SYNC_QUEUE_ITEM, INSERT_SYNC_QUEUE_ITEM,
    RECORD_SYNC_QUEUE_FAILURE, RECOVER_PROCESSING_SYNC_QUEUE_ITEMS,
    RETRY_FAILED_SYNC_QUEUE_ITEMS, SELECT_DUE_SYNC_QUEUE_ITEMS, SELECT_SYNC_QUEUE_ITEMS_BY_STATUS,
    SELECT_SYNC_QUEUE_ITEM_BY_ID,
};
use super::rows::SyncQueueRow;
use crate::application::ports::repositories::{FailureTransition, SyncQueueRepository};
use crate::domain::entities::{QueueSummary, SyncQueueItem, SyncQueueItemDraft};
use crate::domain::value_objects::{SyncQueueId, SyncQueueStatus};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// 呼び出し側のトランザクション内でも使えるよう接続を直接受け取る
pub(super) async fn insert_queue_item(
    conn: &mut SqliteConnection,
    draft: &SyncQueueItemDraft,
    now_millis: i64,
) -> Result<SyncQueueId, AppError> {
    let result = sqlx::query(INSERT_SYNC_QUEUE_ITEM)
        .bind(draft.operation_type.as_str())
        .bind(draft.entity_type.as_str())
        .bind(&draft.entity_id)
        .bind(draft.payload.to_json_string())
        .bind(draft.priority)
        .bind(i64::from(draft.max_retries))
        .bind(now_millis)
        .execute(&mut *conn)
        .await?;

    SyncQueueId::new(result.last_insert_rowid()).map_err(AppError::Internal)
}

#[async_trait]
impl SyncQueueRepository for SqliteRepository {
    async fn enqueue(&self, draft: SyncQueueItemDraft) -> Result<SyncQueueId, AppError> {
        let mut conn = self.pool.get_pool().acquire().await?;
        insert_queue_item(&mut conn, &draft, Utc::now().timestamp_millis()).await
    }

    async fn get_item(&self, id: SyncQueueId) -> Result<Option<SyncQueueItem>, AppError> {
        let row = sqlx::query_as::<_, SyncQueueRow>(SELECT_SYNC_QUEUE_ITEM_BY_ID)
            .bind(id.value())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(queue_item_from_row).transpose()
    }

    async fn get_pending_operations(
        &self,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncQueueItem>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(SELECT_DUE_SYNC_QUEUE_ITEMS)
            .bind(now.timestamp_millis())
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(queue_item_from_row).collect()
    }

    async fn list_by_status(
        &self,
        status: SyncQueueStatus,
        limit: u32,
    ) -> Result<Vec<SyncQueueItem>, AppError> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(SELECT_SYNC_QUEUE_ITEMS_BY_STATUS)
            .bind(status.as_str())
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(queue_item_from_row).collect()
    }

    async fn claim(&self, id: SyncQueueId, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(CLAIM_SYNC_QUEUE_ITEM)
            .bind(id.value())
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_failure(
        &self,
        id: SyncQueueId,
        transition: &FailureTransition,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(RECORD_SYNC_QUEUE_FAILURE)
            .bind(id.value())
            .bind(transition.status.as_str())
            .bind(i64::from(transition.retry_count))
            .bind(transition.next_retry_at.map(|at| at.timestamp_millis()))
            .bind(error)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Sync queue item {id} not found")));
        }
        Ok(())
    }

    async fn mark_completed(&self, id: SyncQueueId, now: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query(COMPLETE_SYNC_QUEUE_ITEM)
            .bind(id.value())
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Sync queue item {id} not found")));
        }
        Ok(())
    }

    async fn defer(
        &self,
        id: SyncQueueId,
        until: DateTime<Utc>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(DEFER_SYNC_QUEUE_ITEM)
            .bind(id.value())
            .bind(until.timestamp_millis())
            .bind(reason)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn retry_failed(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(RETRY_FAILED_SYNC_QUEUE_ITEMS)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn cleanup_completed(&self, completed_before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(CLEANUP_COMPLETED_SYNC_QUEUE_ITEMS)
            .bind(completed_before.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn recover_processing(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(RECOVER_PROCESSING_SYNC_QUEUE_ITEMS)
            .bind(now.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn summary(&self) -> Result<QueueSummary, AppError> {
        let rows = sqlx::query_as::<_, (String, i64)>(COUNT_SYNC_QUEUE_BY_STATUS)
            .fetch_all(self.pool.get_pool())
            .await?;

        let mut summary = QueueSummary::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match SyncQueueStatus::from(status.as_str()) {
                SyncQueueStatus::Pending => summary.pending = count,
                SyncQueueStatus::Processing => summary.processing = count,
                SyncQueueStatus::Completed => summary.completed = count,
                SyncQueueStatus::Failed => summary.failed = count,
                SyncQueueStatus::Unknown(other) => {
                    tracing::warn!(status = %other, count, "unknown sync queue status");
                }
            }
        }
        Ok(summary)
    }
}

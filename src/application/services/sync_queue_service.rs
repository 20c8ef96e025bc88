use crate::application::ports::repositories::{FailureTransition, SyncQueueRepository};
use crate::domain::entities::{QueueSummary, SyncQueueItem, SyncQueueItemDraft};
use crate::domain::value_objects::{SyncQueueId, SyncQueueStatus};
use crate::shared::error::AppError;
use crate::shared::time::{checked_after, checked_before};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
// 設定の上限に関係なく30日より先には延ばさない
const MAX_BACKOFF_SECS: u64 = 30 * 24 * 60 * 60;

/// Delay is `2^n` minutes for the n-th failure, capped at `ceiling`. The
/// n-th failure is terminal once it reaches `max_retries`, or immediately
/// when no retry is wanted.
pub fn compute_failure_transition(
    retry_count: u32,
    max_retries: u32,
    schedule_retry: bool,
    ceiling: Duration,
    now: DateTime<Utc>,
) -> FailureTransition {
    let attempts = retry_count.saturating_add(1).min(max_retries);

    let backoff_secs = 2u64
        .checked_pow(attempts)
        .and_then(|minutes| minutes.checked_mul(SECONDS_PER_MINUTE))
        .unwrap_or(u64::MAX);
    let delay_secs = backoff_secs.min(ceiling.as_secs()).min(MAX_BACKOFF_SECS);
    let delay = chrono::Duration::seconds(delay_secs as i64);

    let status = if !schedule_retry || attempts >= max_retries {
        SyncQueueStatus::Failed
    } else {
        SyncQueueStatus::Pending
    };

    FailureTransition {
        status,
        retry_count: attempts,
        next_retry_at: Some(now + delay),
    }
}

pub struct SyncQueueService {
    queue: Arc<dyn SyncQueueRepository>,
    backoff_ceiling: Duration,
}

impl SyncQueueService {
    pub fn new(queue: Arc<dyn SyncQueueRepository>, backoff_ceiling: Duration) -> Self {
        Self {
            queue,
            backoff_ceiling,
        }
    }

    pub async fn add_to_queue(&self, draft: SyncQueueItemDraft) -> Result<SyncQueueId, AppError> {
        let id = self.queue.enqueue(draft).await?;
        tracing::debug!(queue_id = %id, "queued sync operation");
        Ok(id)
    }

    /// Due `pending` items only; backed-off items stay hidden until
    /// `next_retry_at` passes.
    pub async fn get_pending_operations(&self, limit: u32) -> Result<Vec<SyncQueueItem>, AppError> {
        self.queue.get_pending_operations(limit, Utc::now()).await
    }

    pub async fn claim(&self, id: SyncQueueId) -> Result<bool, AppError> {
        self.queue.claim(id, Utc::now()).await
    }

    pub async fn mark_as_failed(
        &self,
        id: SyncQueueId,
        error: &str,
        schedule_retry: bool,
    ) -> Result<FailureTransition, AppError> {
        let item = self
            .queue
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sync queue item {id} not found")))?;

        let now = Utc::now();
        let transition = compute_failure_transition(
            item.retry_count,
            item.max_retries,
            schedule_retry,
            self.backoff_ceiling,
            now,
        );
        self.queue.record_failure(id, &transition, error, now).await?;

        if transition.status == SyncQueueStatus::Failed {
            tracing::warn!(
                queue_id = %id,
                retry_count = transition.retry_count,
                error,
                "sync operation failed permanently"
            );
        } else {
            tracing::info!(
                queue_id = %id,
                retry_count = transition.retry_count,
                next_retry_at = ?transition.next_retry_at,
                error,
                "sync operation scheduled for retry"
            );
        }
        Ok(transition)
    }

    pub async fn mark_as_completed(&self, id: SyncQueueId) -> Result<(), AppError> {
        self.queue.mark_completed(id, Utc::now()).await
    }

    /// Puts a claimed item back without consuming a retry.
    pub async fn defer(&self, id: SyncQueueId, delay: Duration, reason: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let until = checked_after(now, delay, "Defer delay")?;
        self.queue.defer(id, until, reason, now).await
    }

    pub async fn retry_failed(&self) -> Result<u64, AppError> {
        let reset = self.queue.retry_failed(Utc::now()).await?;
        if reset > 0 {
            tracing::info!(count = reset, "failed sync operations reset for retry");
        }
        Ok(reset)
    }

    pub async fn cleanup_completed(&self, days_old: u32) -> Result<u64, AppError> {
        let age = Duration::from_secs(u64::from(days_old) * SECONDS_PER_DAY);
        let cutoff = checked_before(Utc::now(), age, "Completed retention")?;
        self.queue.cleanup_completed(cutoff).await
    }

    pub async fn recover_processing(&self) -> Result<u64, AppError> {
        self.queue.recover_processing(Utc::now()).await
    }

    pub async fn queue_summary(&self) -> Result<QueueSummary, AppError> {
        self.queue.summary().await
    }

    pub async fn get_queue_item(&self, id: SyncQueueId) -> Result<Option<SyncQueueItem>, AppError> {
        self.queue.get_item(id).await
    }

    pub async fn list_failed(&self, limit: u32) -> Result<Vec<SyncQueueItem>, AppError> {
        self.queue.list_by_status(SyncQueueStatus::Failed, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::sqlite_repository::test_support::setup_repository;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    async fn setup_service() -> SyncQueueService {
        let repo = setup_repository().await;
        SyncQueueService::new(repo, DAY)
    }

    #[test]
    fn test_backoff_doubles_per_failure() {
        let now = Utc::now();
        let deltas: Vec<i64> = (0..3)
            .map(|count| {
                let t = compute_failure_transition(count, 10, true, DAY, now);
                (t.next_retry_at.unwrap() - now).num_minutes()
            })
            .collect();
        assert_eq!(deltas, vec![2, 4, 8]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let now = Utc::now();
        let t = compute_failure_transition(29, 40, true, DAY, now);
        assert_eq!(t.next_retry_at.unwrap() - now, chrono::Duration::hours(24));
        assert_eq!(t.status, SyncQueueStatus::Pending);
    }

    #[test]
    fn test_no_retry_is_terminal() {
        let t = compute_failure_transition(0, 5, false, DAY, Utc::now());
        assert_eq!(t.status, SyncQueueStatus::Failed);
        assert_eq!(t.retry_count, 1);
    }

    #[tokio::test]
    async fn test_fails_terminally_after_max_retries() {
        let service = setup_service().await;
        let id = service
            .add_to_queue(SyncQueueItemDraft::submit_response("r1", 3))
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let mut statuses = Vec::new();
        for _ in 0..3 {
            assert!(service.claim(id).await.unwrap());
            service.mark_as_failed(id, "offline", true).await.unwrap();

            let item = service.get_queue_item(id).await.unwrap().unwrap();
            deltas.push((item.next_retry_at.unwrap() - item.updated_at).num_minutes());
            statuses.push(item.status.clone());
            assert!(item.retry_count <= item.max_retries);
        }

        assert_eq!(deltas, vec![2, 4, 8]);
        assert_eq!(
            statuses,
            vec![
                SyncQueueStatus::Pending,
                SyncQueueStatus::Pending,
                SyncQueueStatus::Failed
            ]
        );
        assert!(!service.claim(id).await.unwrap());
        assert_eq!(service.list_failed(10).await.unwrap().len(), 1);

        assert_eq!(service.retry_failed().await.unwrap(), 1);
        let item = service.get_queue_item(id).await.unwrap().unwrap();
        assert_eq!(item.retry_count, 0);
        assert!(item.next_retry_at.is_none());
    }

    #[tokio::test]
    async fn test_backed_off_item_is_not_pending() {
        let service = setup_service().await;
        let id = service
            .add_to_queue(SyncQueueItemDraft::submit_response("r1", 5))
            .await
            .unwrap();
        assert_eq!(service.get_pending_operations(10).await.unwrap().len(), 1);

        service.claim(id).await.unwrap();
        service.mark_as_failed(id, "timeout", true).await.unwrap();
        assert!(service.get_pending_operations(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defer_keeps_retry_budget() {
        let service = setup_service().await;
        let id = service
            .add_to_queue(SyncQueueItemDraft::submit_response("r1", 5))
            .await
            .unwrap();
        service.claim(id).await.unwrap();
        service
            .defer(id, Duration::from_secs(60), "waiting for media")
            .await
            .unwrap();

        let item = service.get_queue_item(id).await.unwrap().unwrap();
        assert_eq!(item.status, SyncQueueStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert!(!item.is_due(Utc::now()));
        assert_eq!(item.last_error.as_deref(), Some("waiting for media"));
    }

    #[tokio::test]
    async fn test_mark_as_failed_unknown_item() {
        let service = setup_service().await;
        let err = service
            .mark_as_failed(SyncQueueId::new(42).unwrap(), "x", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_with_unrepresentable_age_is_rejected() {
        let service = setup_service().await;
        let err = service.cleanup_completed(u32::MAX).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(service.cleanup_completed(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_defer_with_unrepresentable_delay_is_rejected() {
        let service = setup_service().await;
        let id = service
            .add_to_queue(SyncQueueItemDraft::submit_response("r1", 5))
            .await
            .unwrap();
        let err = service.defer(id, Duration::MAX, "later").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}

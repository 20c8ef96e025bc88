use crate::application::ports::repositories::ResponseRepository;
use crate::domain::entities::{NewSurveyResponse, SurveyResponse, SyncQueueItemDraft};
use crate::domain::value_objects::{
    AnswerMap, ResponseId, ResponseStatus, ResponseSyncStatus, ReviewOutcome,
};
use crate::infrastructure::storage::FileStore;
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;

/// 回答レコードのライフサイクル（下書き → 完了 → 同期済み/エラー）を管理する
pub struct ResponseService {
    responses: Arc<dyn ResponseRepository>,
    file_store: FileStore,
    max_retries: u32,
}

impl ResponseService {
    pub fn new(
        responses: Arc<dyn ResponseRepository>,
        file_store: FileStore,
        max_retries: u32,
    ) -> Self {
        Self {
            responses,
            file_store,
            max_retries,
        }
    }

    pub async fn create_response(&self, params: NewSurveyResponse) -> Result<ResponseId, AppError> {
        params.validate().map_err(AppError::ValidationError)?;

        let response = params.into_response(ResponseId::generate(), Utc::now());
        self.responses.insert_response(&response).await?;

        tracing::debug!(
            response_id = %response.id,
            survey_id = %response.survey_id,
            "draft response created"
        );
        Ok(response.id)
    }

    /// Replaces the whole answer map. The last committed snapshot wins.
    pub async fn update_answers(&self, id: &ResponseId, answers: AnswerMap) -> Result<(), AppError> {
        let response = self.require(id).await?;
        response
            .accepts_answer_updates()
            .map_err(AppError::ValidationError)?;

        self.responses.update_answers(id, &answers, Utc::now()).await
    }

    /// 完了への遷移と送信ジョブの登録は同じトランザクションで確定する
    pub async fn complete_response(&self, id: &ResponseId) -> Result<SurveyResponse, AppError> {
        let response = self.require(id).await?;
        if response.status != ResponseStatus::Draft {
            return Err(AppError::InvalidInput(format!(
                "Response {id} is already {}",
                response.status
            )));
        }

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - response.started_at).num_seconds().max(0);
        let job = SyncQueueItemDraft::submit_response(id.as_str(), self.max_retries);

        let queue_id = self
            .responses
            .complete_and_enqueue(id, completed_at, duration_seconds, job)
            .await?;
        tracing::info!(
            response_id = %id,
            queue_id = %queue_id,
            duration_seconds,
            "response completed"
        );

        self.require(id).await
    }

    pub async fn get_response_by_id(
        &self,
        id: &ResponseId,
    ) -> Result<Option<SurveyResponse>, AppError> {
        self.responses.get_response(id).await
    }

    pub async fn get_responses_by_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SurveyResponse>, AppError> {
        self.responses.list_responses_by_user(user_id, limit).await
    }

    pub async fn get_pending_sync_responses(&self) -> Result<Vec<SurveyResponse>, AppError> {
        self.responses.list_pending_sync_responses().await
    }

    pub async fn mark_syncing(&self, id: &ResponseId) -> Result<(), AppError> {
        self.responses.mark_syncing(id).await
    }

    pub async fn mark_as_synced(
        &self,
        id: &ResponseId,
        remote_response_id: Option<&str>,
    ) -> Result<(), AppError> {
        if !self
            .responses
            .mark_synced(id, remote_response_id, Utc::now())
            .await?
        {
            return Err(AppError::InvalidInput(format!(
                "Response {id} must be completed before it can be synced"
            )));
        }
        tracing::info!(response_id = %id, remote_response_id, "response synced");
        Ok(())
    }

    /// Records the failure only. Retry timing belongs to the queue.
    pub async fn mark_sync_error(&self, id: &ResponseId, message: &str) -> Result<(), AppError> {
        self.responses.mark_sync_error(id, message).await
    }

    /// 前回プロセスが送信中のまま終了した回答を pending に戻す
    pub async fn recover_interrupted_syncs(&self) -> Result<u64, AppError> {
        self.responses.reset_interrupted_syncs().await
    }

    pub async fn apply_review(
        &self,
        id: &ResponseId,
        outcome: ReviewOutcome,
    ) -> Result<SurveyResponse, AppError> {
        let response = self.require(id).await?;

        match outcome {
            ReviewOutcome::Validated => {
                if response.sync_status != ResponseSyncStatus::Synced {
                    return Err(AppError::InvalidInput(format!(
                        "Response {id} must be synced before validation"
                    )));
                }
                let hash = response.answers.content_hash()?;
                self.responses
                    .apply_review(id, outcome.into(), Some(hash.as_str()), true)
                    .await?;
                tracing::info!(response_id = %id, content_hash = %hash, "response frozen");
            }
            ReviewOutcome::Rejected => {
                self.responses
                    .apply_review(id, outcome.into(), None, response.immutable)
                    .await?;
                tracing::info!(response_id = %id, "response rejected by review");
            }
        }

        self.require(id).await
    }

    /// `Ok(false)` means the stored answers no longer match the frozen hash.
    pub async fn verify_integrity(&self, id: &ResponseId) -> Result<bool, AppError> {
        let response = self.require(id).await?;
        let Some(expected) = response.content_hash.as_deref() else {
            return Err(AppError::InvalidInput(format!(
                "Response {id} has no recorded content hash"
            )));
        };

        let actual = response.answers.content_hash()?;
        if actual != expected {
            tracing::error!(response_id = %id, expected, actual = %actual, "content hash mismatch");
        }
        Ok(actual == expected)
    }

    pub async fn delete_draft(&self, id: &ResponseId) -> Result<(), AppError> {
        let response = self.require(id).await?;
        if !response.is_deletable() {
            return Err(AppError::InvalidInput(format!(
                "Only unsynced drafts can be deleted (response {id} is {})",
                response.status
            )));
        }

        let contents = self.responses.delete_draft(id).await?;
        for content in &contents {
            if let Err(err) = self.file_store.remove_content(content).await {
                tracing::warn!(response_id = %id, error = %err, "failed to remove local media");
            }
        }

        tracing::info!(response_id = %id, files = contents.len(), "draft deleted");
        Ok(())
    }

    async fn require(&self, id: &ResponseId) -> Result<SurveyResponse, AppError> {
        self.responses
            .get_response(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Response {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::repositories::SyncQueueRepository;
    use crate::domain::value_objects::{GeoLocation, SyncOperationType};
    use crate::infrastructure::database::SqliteRepository;
    use crate::infrastructure::database::sqlite_repository::test_support::setup_repository;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_service() -> (ResponseService, Arc<SqliteRepository>, TempDir) {
        let repo = setup_repository().await;
        let dir = TempDir::new().unwrap();
        let service = ResponseService::new(repo.clone(), FileStore::new(dir.path()), 3);
        (service, repo, dir)
    }

    fn answers(value: &str) -> AnswerMap {
        [("q1", json!(value))].into_iter().collect()
    }

    #[tokio::test]
    async fn test_complete_response_enqueues_submission() {
        let (service, repo, _dir) = setup_service().await;
        let id = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        service.update_answers(&id, answers("yes")).await.unwrap();

        let completed = service.complete_response(&id).await.unwrap();
        assert_eq!(completed.status, ResponseStatus::Completed);
        assert!(completed.duration_seconds.unwrap() >= 0);
        assert!(completed.completed_at.is_some());

        let due = repo.get_pending_operations(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].operation_type, SyncOperationType::SubmitResponse);
        assert_eq!(due[0].entity_id, id.as_str());
        assert_eq!(due[0].max_retries, 3);

        assert!(service.complete_response(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_last_snapshot_wins() {
        let (service, _repo, _dir) = setup_service().await;
        let id = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();

        service.update_answers(&id, answers("no")).await.unwrap();
        let mut second = AnswerMap::new();
        second.insert("q2", json!(4));
        service.update_answers(&id, second.clone()).await.unwrap();

        let stored = service.get_response_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.answers, second);
        assert!(stored.answers.get("q1").is_none());
    }

    #[tokio::test]
    async fn test_create_response_rejects_invalid_location() {
        let (service, _repo, _dir) = setup_service().await;
        let params = NewSurveyResponse::new("S1", "v1", "user-1").with_location(GeoLocation {
            latitude: 123.0,
            longitude: 0.0,
            accuracy_m: None,
            altitude_m: None,
            captured_at: Utc::now(),
        });
        let err = service.create_response(params).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_mark_as_synced_requires_completion() {
        let (service, _repo, _dir) = setup_service().await;
        let id = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        assert!(service.mark_as_synced(&id, None).await.is_err());

        service.complete_response(&id).await.unwrap();
        service.mark_sync_error(&id, "offline").await.unwrap();
        let errored = service.get_response_by_id(&id).await.unwrap().unwrap();
        assert_eq!(errored.sync_status, ResponseSyncStatus::Error);
        assert_eq!(errored.sync_attempts, 1);
        assert_eq!(service.get_pending_sync_responses().await.unwrap().len(), 1);

        service.mark_as_synced(&id, Some("srv-1")).await.unwrap();
        let synced = service.get_response_by_id(&id).await.unwrap().unwrap();
        assert_eq!(synced.sync_status, ResponseSyncStatus::Synced);
        assert!(synced.last_synced_at.is_some());
        assert!(synced.last_sync_error.is_none());
    }

    #[tokio::test]
    async fn test_validation_freezes_response() {
        let (service, _repo, _dir) = setup_service().await;
        let id = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        service.update_answers(&id, answers("yes")).await.unwrap();
        service.complete_response(&id).await.unwrap();

        assert!(service.apply_review(&id, ReviewOutcome::Validated).await.is_err());

        service.mark_as_synced(&id, None).await.unwrap();
        let frozen = service
            .apply_review(&id, ReviewOutcome::Validated)
            .await
            .unwrap();
        assert_eq!(frozen.status, ResponseStatus::Validated);
        assert!(frozen.immutable);
        assert!(service.verify_integrity(&id).await.unwrap());
        assert!(service.update_answers(&id, answers("no")).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_integrity_detects_tampering() {
        let (service, repo, _dir) = setup_service().await;
        let id = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        service.update_answers(&id, answers("yes")).await.unwrap();
        service.complete_response(&id).await.unwrap();
        service.mark_as_synced(&id, None).await.unwrap();
        service.apply_review(&id, ReviewOutcome::Validated).await.unwrap();

        sqlx::query("UPDATE responses SET answers = '{\"q1\":\"no\"}' WHERE id = ?1")
            .bind(id.as_str())
            .execute(repo.pool().get_pool())
            .await
            .unwrap();
        assert!(!service.verify_integrity(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_draft_only_for_drafts() {
        let (service, _repo, _dir) = setup_service().await;
        let draft = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        let done = service
            .create_response(NewSurveyResponse::new("S1", "v1", "user-1"))
            .await
            .unwrap();
        service.complete_response(&done).await.unwrap();

        assert!(service.delete_draft(&done).await.is_err());
        service.delete_draft(&draft).await.unwrap();
        assert!(service.get_response_by_id(&draft).await.unwrap().is_none());
        assert_eq!(
            service.get_responses_by_user("user-1", None).await.unwrap().len(),
            1
        );
    }
}

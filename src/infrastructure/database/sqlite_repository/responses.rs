use super::SqliteRepository;
use super::mapper::response_from_row;
use super::queries::{
    APPLY_RESPONSE_REVIEW, COMPLETE_RESPONSE, DELETE_DRAFT_RESPONSE,
    DELETE_QUEUE_ITEMS_FOR_RESPONSE, INSERT_RESPONSE, MARK_RESPONSE_SYNCED,
    MARK_RESPONSE_SYNC_ERROR, MARK_RESPONSE_SYNCING, RESET_SYNCING_RESPONSES,
    SELECT_FILE_CONTENT_FOR_RESPONSE, SELECT_PENDING_SYNC_RESPONSES, SELECT_RESPONSE_BY_ID,
    SELECT_RESPONSES_BY_USER, UPDATE_RESPONSE_ANSWERS,
};
use super::rows::ResponseRow;
use super::sync_queue::insert_queue_item;
use crate::application::ports::repositories::ResponseRepository;
use crate::domain::entities::{FileContent, SurveyResponse, SyncQueueItemDraft};
use crate::domain::value_objects::{AnswerMap, ResponseId, ResponseStatus, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

#[async_trait]
impl ResponseRepository for SqliteRepository {
    async fn insert_response(&self, response: &SurveyResponse) -> Result<(), AppError> {
        let answers = response.answers.to_json_string()?;
        let device_info = response
            .device_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let location = response
            .location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(INSERT_RESPONSE)
            .bind(response.id.as_str())
            .bind(&response.survey_id)
            .bind(&response.survey_version)
            .bind(&response.user_id)
            .bind(&response.assignment_id)
            .bind(response.status.as_str())
            .bind(answers)
            .bind(device_info)
            .bind(location)
            .bind(response.started_at.timestamp_millis())
            .bind(response.completed_at.map(|at| at.timestamp_millis()))
            .bind(response.duration_seconds)
            .bind(response.sync_status.as_str())
            .bind(i64::from(response.sync_attempts))
            .bind(&response.last_sync_error)
            .bind(response.last_synced_at.map(|at| at.timestamp_millis()))
            .bind(&response.remote_response_id)
            .bind(response.immutable)
            .bind(&response.content_hash)
            .bind(response.created_at.timestamp_millis())
            .bind(response.updated_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn update_answers(
        &self,
        id: &ResponseId,
        answers: &AnswerMap,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(UPDATE_RESPONSE_ANSWERS)
            .bind(id.as_str())
            .bind(answers.to_json_string()?)
            .bind(updated_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidInput(format!(
                "Response {id} does not accept answer updates"
            )));
        }
        Ok(())
    }

    async fn complete_and_enqueue(
        &self,
        id: &ResponseId,
        completed_at: DateTime<Utc>,
        duration_seconds: i64,
        job: SyncQueueItemDraft,
    ) -> Result<SyncQueueId, AppError> {
        let id = id.as_str().to_string();
        let completed_millis = completed_at.timestamp_millis();

        self.pool
            .transaction(move |conn| {
                Box::pin(async move {
                    let result = sqlx::query(COMPLETE_RESPONSE)
                        .bind(&id)
                        .bind(completed_millis)
                        .bind(duration_seconds)
                        .execute(&mut *conn)
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(AppError::InvalidInput(format!(
                            "Response {id} is not a draft"
                        )));
                    }
                    insert_queue_item(conn, &job, completed_millis).await
                })
            })
            .await
    }

    async fn get_response(&self, id: &ResponseId) -> Result<Option<SurveyResponse>, AppError> {
        let row = sqlx::query_as::<_, ResponseRow>(SELECT_RESPONSE_BY_ID)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(response_from_row).transpose()
    }

    async fn list_responses_by_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SurveyResponse>, AppError> {
        // SQLite では負の LIMIT は無制限
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query_as::<_, ResponseRow>(SELECT_RESPONSES_BY_USER)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(response_from_row).collect()
    }

    async fn list_pending_sync_responses(&self) -> Result<Vec<SurveyResponse>, AppError> {
        let rows = sqlx::query_as::<_, ResponseRow>(SELECT_PENDING_SYNC_RESPONSES)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(response_from_row).collect()
    }

    async fn mark_syncing(&self, id: &ResponseId) -> Result<(), AppError> {
        sqlx::query(MARK_RESPONSE_SYNCING)
            .bind(id.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn mark_synced(
        &self,
        id: &ResponseId,
        remote_response_id: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(MARK_RESPONSE_SYNCED)
            .bind(id.as_str())
            .bind(synced_at.timestamp_millis())
            .bind(remote_response_id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_sync_error(&self, id: &ResponseId, message: &str) -> Result<(), AppError> {
        sqlx::query(MARK_RESPONSE_SYNC_ERROR)
            .bind(id.as_str())
            .bind(message)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn apply_review(
        &self,
        id: &ResponseId,
        status: ResponseStatus,
        content_hash: Option<&str>,
        immutable: bool,
    ) -> Result<(), AppError> {
        let result = sqlx::query(APPLY_RESPONSE_REVIEW)
            .bind(id.as_str())
            .bind(status.as_str())
            .bind(content_hash)
            .bind(immutable)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Response {id} not found")));
        }
        Ok(())
    }

    async fn delete_draft(&self, id: &ResponseId) -> Result<Vec<FileContent>, AppError> {
        let id = id.as_str().to_string();

        self.pool
            .transaction(move |conn| {
                Box::pin(async move {
                    let rows = sqlx::query(SELECT_FILE_CONTENT_FOR_RESPONSE)
                        .bind(&id)
                        .fetch_all(&mut *conn)
                        .await?;

                    let mut contents = Vec::with_capacity(rows.len());
                    for row in rows {
                        let path: Option<String> = row.try_get("local_path")?;
                        let inline: Option<String> = row.try_get("inline_data")?;
                        match (path, inline) {
                            (Some(path), _) => contents.push(FileContent::path(path)),
                            (None, Some(data)) => contents.push(FileContent::inline(data)),
                            (None, None) => {}
                        }
                    }

                    sqlx::query(DELETE_QUEUE_ITEMS_FOR_RESPONSE)
                        .bind(&id)
                        .execute(&mut *conn)
                        .await?;

                    let deleted = sqlx::query(DELETE_DRAFT_RESPONSE)
                        .bind(&id)
                        .execute(&mut *conn)
                        .await?;
                    if deleted.rows_affected() == 0 {
                        return Err(AppError::InvalidInput(format!(
                            "Response {id} is not an unsynced draft"
                        )));
                    }

                    Ok(contents)
                })
            })
            .await
    }

    async fn reset_interrupted_syncs(&self) -> Result<u64, AppError> {
        let result = sqlx::query(RESET_SYNCING_RESPONSES)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}

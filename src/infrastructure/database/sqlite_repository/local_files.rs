use super::SqliteRepository;
use super::mapper::local_file_from_row;
use super::queries::{
    ATTACH_FILE_EXTRACTION, COUNT_RESPONSE_ACCEPTING_FILES, INSERT_LOCAL_FILE,
    MARK_FILE_CONTENT_PURGED, MARK_FILE_UPLOADED, MARK_FILE_UPLOADING, MARK_FILE_UPLOAD_ERROR,
    RESET_UPLOADING_FILES, SELECT_LOCAL_FILES_BY_RESPONSE, SELECT_LOCAL_FILE_BY_ID,
    SELECT_PURGEABLE_FILES, SELECT_UPLOADABLE_FILES,
};
use super::rows::LocalFileRow;
use super::sync_queue::insert_queue_item;
use crate::application::ports::repositories::LocalFileRepository;
use crate::domain::entities::{FileContent, LocalFile, RemoteObject, SyncQueueItemDraft};
use crate::domain::value_objects::{LocalFileId, ResponseId, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// `local_files` の INSERT に必要な値。トランザクションへ所有権ごと渡す
struct LocalFileInsert {
    id: String,
    response_id: String,
    question_id: String,
    kind: &'static str,
    local_path: Option<String>,
    inline_data: Option<String>,
    file_name: String,
    mime_type: String,
    size_bytes: i64,
    sync_status: &'static str,
    upload_attempts: i64,
    last_error: Option<String>,
    remote_object_id: Option<String>,
    remote_version: Option<String>,
    remote_url: Option<String>,
    extraction: Option<String>,
    uploaded_at: Option<i64>,
    local_purged_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl LocalFileInsert {
    fn from_entity(file: &LocalFile) -> Result<Self, AppError> {
        let (local_path, inline_data) = match &file.content {
            Some(FileContent::Path { path }) => (Some(path.to_string_lossy().into_owned()), None),
            Some(FileContent::Inline { data }) => (None, Some(data.clone())),
            None => (None, None),
        };
        let remote = file.remote.as_ref();

        Ok(Self {
            id: file.id.as_str().to_string(),
            response_id: file.response_id.as_str().to_string(),
            question_id: file.question_id.clone(),
            kind: file.kind.as_str(),
            local_path,
            inline_data,
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: i64::try_from(file.size_bytes).unwrap_or(i64::MAX),
            sync_status: file.sync_status.as_str(),
            upload_attempts: i64::from(file.upload_attempts),
            last_error: file.last_error.clone(),
            remote_object_id: remote.map(|r| r.object_id.clone()),
            remote_version: remote.and_then(|r| r.version.clone()),
            remote_url: remote.map(|r| r.url.clone()),
            extraction: file
                .extraction
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            uploaded_at: file.uploaded_at.map(|at| at.timestamp_millis()),
            local_purged_at: file.local_purged_at.map(|at| at.timestamp_millis()),
            created_at: file.created_at.timestamp_millis(),
            updated_at: file.updated_at.timestamp_millis(),
        })
    }
}

#[async_trait]
impl LocalFileRepository for SqliteRepository {
    async fn insert_file_and_enqueue(
        &self,
        file: &LocalFile,
        job: SyncQueueItemDraft,
    ) -> Result<SyncQueueId, AppError> {
        let insert = LocalFileInsert::from_entity(file)?;

        self.pool
            .transaction(move |conn| {
                Box::pin(async move {
                    // 送信済み・凍結済みの回答に付けたファイルはどの送信からも参照されない
                    let accepting: i64 = sqlx::query_scalar(COUNT_RESPONSE_ACCEPTING_FILES)
                        .bind(&insert.response_id)
                        .fetch_one(&mut *conn)
                        .await?;
                    if accepting == 0 {
                        return Err(AppError::InvalidInput(format!(
                            "Response {} does not accept new files",
                            insert.response_id
                        )));
                    }

                    sqlx::query(INSERT_LOCAL_FILE)
                        .bind(&insert.id)
                        .bind(&insert.response_id)
                        .bind(&insert.question_id)
                        .bind(insert.kind)
                        .bind(&insert.local_path)
                        .bind(&insert.inline_data)
                        .bind(&insert.file_name)
                        .bind(&insert.mime_type)
                        .bind(insert.size_bytes)
                        .bind(insert.sync_status)
                        .bind(insert.upload_attempts)
                        .bind(&insert.last_error)
                        .bind(&insert.remote_object_id)
                        .bind(&insert.remote_version)
                        .bind(&insert.remote_url)
                        .bind(&insert.extraction)
                        .bind(insert.uploaded_at)
                        .bind(insert.local_purged_at)
                        .bind(insert.created_at)
                        .bind(insert.updated_at)
                        .execute(&mut *conn)
                        .await?;

                    insert_queue_item(conn, &job, insert.created_at).await
                })
            })
            .await
    }

    async fn get_file(&self, id: &LocalFileId) -> Result<Option<LocalFile>, AppError> {
        let row = sqlx::query_as::<_, LocalFileRow>(SELECT_LOCAL_FILE_BY_ID)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(local_file_from_row).transpose()
    }

    async fn list_files_for_response(
        &self,
        response_id: &ResponseId,
    ) -> Result<Vec<LocalFile>, AppError> {
        let rows = sqlx::query_as::<_, LocalFileRow>(SELECT_LOCAL_FILES_BY_RESPONSE)
            .bind(response_id.as_str())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(local_file_from_row).collect()
    }

    async fn list_uploadable_files(&self, limit: u32) -> Result<Vec<LocalFile>, AppError> {
        let rows = sqlx::query_as::<_, LocalFileRow>(SELECT_UPLOADABLE_FILES)
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(local_file_from_row).collect()
    }

    async fn mark_uploading(&self, id: &LocalFileId) -> Result<(), AppError> {
        let result = sqlx::query(MARK_FILE_UPLOADING)
            .bind(id.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidInput(format!(
                "File {id} is missing or already uploaded"
            )));
        }
        Ok(())
    }

    async fn mark_uploaded(
        &self,
        id: &LocalFileId,
        remote: &RemoteObject,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(MARK_FILE_UPLOADED)
            .bind(id.as_str())
            .bind(&remote.object_id)
            .bind(&remote.version)
            .bind(&remote.url)
            .bind(uploaded_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {id} not found")));
        }
        Ok(())
    }

    async fn mark_upload_error(&self, id: &LocalFileId, message: &str) -> Result<(), AppError> {
        sqlx::query(MARK_FILE_UPLOAD_ERROR)
            .bind(id.as_str())
            .bind(message)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn attach_extraction(
        &self,
        id: &LocalFileId,
        extraction: &Value,
    ) -> Result<(), AppError> {
        let result = sqlx::query(ATTACH_FILE_EXTRACTION)
            .bind(id.as_str())
            .bind(serde_json::to_string(extraction)?)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {id} not found")));
        }
        Ok(())
    }

    async fn list_purgeable_files(
        &self,
        uploaded_before: DateTime<Utc>,
    ) -> Result<Vec<LocalFile>, AppError> {
        let rows = sqlx::query_as::<_, LocalFileRow>(SELECT_PURGEABLE_FILES)
            .bind(uploaded_before.timestamp_millis())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(local_file_from_row).collect()
    }

    async fn mark_content_purged(
        &self,
        id: &LocalFileId,
        purged_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(MARK_FILE_CONTENT_PURGED)
            .bind(id.as_str())
            .bind(purged_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn reset_interrupted_uploads(&self) -> Result<u64, AppError> {
        let result = sqlx::query(RESET_UPLOADING_FILES)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}

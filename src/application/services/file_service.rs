use crate::application::ports::repositories::LocalFileRepository;
use crate::domain::entities::{LocalFile, NewLocalFile, SyncQueueItemDraft};
use crate::domain::value_objects::{FileSyncStatus, LocalFileId, ResponseId};
use crate::infrastructure::storage::FileStore;
use crate::shared::error::AppError;
use crate::shared::time::checked_before;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// 端末で取得したメディアの登録と保持期間管理
pub struct FileService {
    files: Arc<dyn LocalFileRepository>,
    file_store: FileStore,
    max_retries: u32,
}

impl FileService {
    pub fn new(files: Arc<dyn LocalFileRepository>, file_store: FileStore, max_retries: u32) -> Self {
        Self {
            files,
            file_store,
            max_retries,
        }
    }

    /// Registers the file and its upload job in one transaction.
    pub async fn create_file(&self, params: NewLocalFile) -> Result<LocalFile, AppError> {
        params.validate().map_err(AppError::ValidationError)?;
        let size_bytes = self.file_store.size_of(&params.content).await?;

        let id = LocalFileId::generate();
        let now = Utc::now();
        let file = LocalFile {
            file_name: params.resolved_file_name(&id),
            id,
            response_id: params.response_id,
            question_id: params.question_id,
            kind: params.kind,
            content: Some(params.content),
            mime_type: params.mime_type,
            size_bytes,
            sync_status: FileSyncStatus::Pending,
            upload_attempts: 0,
            last_error: None,
            remote: None,
            extraction: None,
            uploaded_at: None,
            local_purged_at: None,
            created_at: now,
            updated_at: now,
        };

        let job = SyncQueueItemDraft::upload_file(
            file.id.as_str(),
            file.response_id.as_str(),
            self.max_retries,
        );
        let queue_id = self.files.insert_file_and_enqueue(&file, job).await?;
        tracing::debug!(
            file_id = %file.id,
            response_id = %file.response_id,
            queue_id = %queue_id,
            size_bytes,
            "local file registered"
        );
        Ok(file)
    }

    pub async fn get_file(&self, id: &LocalFileId) -> Result<Option<LocalFile>, AppError> {
        self.files.get_file(id).await
    }

    pub async fn list_for_response(
        &self,
        response_id: &ResponseId,
    ) -> Result<Vec<LocalFile>, AppError> {
        self.files.list_files_for_response(response_id).await
    }

    /// The payload is stored as given and never interpreted here.
    pub async fn attach_extraction(
        &self,
        id: &LocalFileId,
        extraction: Value,
    ) -> Result<(), AppError> {
        if extraction.is_null() {
            return Err(AppError::ValidationError(
                "Extraction payload cannot be null".to_string(),
            ));
        }
        self.files.attach_extraction(id, &extraction).await
    }

    /// Deletes local bytes of files uploaded before `now - retention`.
    /// Metadata and the remote identity are kept.
    pub async fn purge_uploaded_content(&self, retention: Duration) -> Result<u64, AppError> {
        let now = Utc::now();
        let cutoff = checked_before(now, retention, "File retention")?;
        let candidates = self.files.list_purgeable_files(cutoff).await?;

        let mut purged = 0;
        for file in candidates {
            if let Some(content) = &file.content {
                if let Err(err) = self.file_store.remove_content(content).await {
                    tracing::warn!(file_id = %file.id, error = %err, "failed to purge local bytes");
                    continue;
                }
            }
            self.files.mark_content_purged(&file.id, now).await?;
            purged += 1;
        }

        if purged > 0 {
            tracing::info!(count = purged, "purged local bytes of uploaded files");
        }
        Ok(purged)
    }

    pub async fn recover_interrupted_uploads(&self) -> Result<u64, AppError> {
        self.files.reset_interrupted_uploads().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::repositories::{ResponseRepository, SyncQueueRepository};
    use crate::domain::entities::{FileContent, NewSurveyResponse, RemoteObject};
    use crate::domain::value_objects::{FileKind, SyncOperationType};
    use crate::infrastructure::database::SqliteRepository;
    use crate::infrastructure::database::sqlite_repository::test_support::setup_repository;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_service() -> (FileService, Arc<SqliteRepository>, ResponseId, TempDir) {
        let repo = setup_repository().await;
        let response = NewSurveyResponse::new("S1", "v1", "user-1")
            .into_response(ResponseId::generate(), Utc::now());
        repo.insert_response(&response).await.unwrap();

        let dir = TempDir::new().unwrap();
        let service = FileService::new(repo.clone(), FileStore::new(dir.path()), 4);
        (service, repo, response.id, dir)
    }

    fn signature(response_id: &ResponseId) -> NewLocalFile {
        NewLocalFile {
            response_id: response_id.clone(),
            question_id: "q_signature".into(),
            kind: FileKind::Signature,
            content: FileContent::inline("data:image/png;base64,iVBORw0KGgo="),
            file_name: None,
            mime_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn test_create_file_enqueues_upload() {
        let (service, repo, response_id, _dir) = setup_service().await;
        let file = service.create_file(signature(&response_id)).await.unwrap();

        assert_eq!(file.size_bytes, 8);
        assert_eq!(file.sync_status, FileSyncStatus::Pending);
        assert!(file.file_name.ends_with(".png"));

        let due = repo.get_pending_operations(10, Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].operation_type, SyncOperationType::UploadFile);
        assert_eq!(due[0].entity_id, file.id.as_str());
        assert_eq!(
            due[0].payload.as_json(),
            &json!({"file_id": file.id.as_str(), "response_id": response_id.as_str()})
        );
    }

    #[tokio::test]
    async fn test_create_file_requires_readable_content() {
        let (service, _repo, response_id, dir) = setup_service().await;
        let mut params = signature(&response_id);
        params.content = FileContent::path(dir.path().join("missing.jpg"));
        assert!(service.create_file(params).await.is_err());
        assert!(service.list_for_response(&response_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_extraction() {
        let (service, _repo, response_id, _dir) = setup_service().await;
        let file = service.create_file(signature(&response_id)).await.unwrap();

        assert!(service.attach_extraction(&file.id, Value::Null).await.is_err());
        service
            .attach_extraction(&file.id, json!({"name": "A. Field"}))
            .await
            .unwrap();
        let stored = service.get_file(&file.id).await.unwrap().unwrap();
        assert_eq!(stored.extraction, Some(json!({"name": "A. Field"})));
    }

    #[tokio::test]
    async fn test_purge_removes_bytes_after_retention() {
        let (service, repo, response_id, dir) = setup_service().await;
        let path = dir.path().join("IMG_9.jpg");
        tokio::fs::write(&path, b"JPEG").await.unwrap();

        let mut params = signature(&response_id);
        params.kind = FileKind::Photo;
        params.content = FileContent::path(&path);
        params.mime_type = "image/jpeg".into();
        let file = service.create_file(params).await.unwrap();
        assert_eq!(file.file_name, "IMG_9.jpg");

        // 未アップロードのものは保持期間に関係なく残す
        assert_eq!(service.purge_uploaded_content(Duration::ZERO).await.unwrap(), 0);

        let remote = RemoteObject {
            object_id: "obj-9".into(),
            version: None,
            url: "https://storage.example/obj-9".into(),
        };
        repo.mark_uploaded(&file.id, &remote, Utc::now() - chrono::Duration::hours(80))
            .await
            .unwrap();

        assert_eq!(
            service
                .purge_uploaded_content(Duration::from_secs(72 * 60 * 60))
                .await
                .unwrap(),
            1
        );
        assert!(!path.exists());
        let stored = service.get_file(&file.id).await.unwrap().unwrap();
        assert!(stored.content.is_none());
        assert!(stored.is_uploaded());
        assert_eq!(stored.remote, Some(remote));
    }

    #[tokio::test]
    async fn test_purge_with_unrepresentable_retention_is_rejected() {
        let (service, _repo, _response_id, _dir) = setup_service().await;
        let err = service
            .purge_uploaded_content(Duration::from_secs(u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_synced_response_does_not_accept_files() {
        let (service, repo, response_id, _dir) = setup_service().await;
        let now = Utc::now();
        repo.complete_and_enqueue(
            &response_id,
            now,
            0,
            SyncQueueItemDraft::submit_response(response_id.as_str(), 3),
        )
        .await
        .unwrap();
        assert!(repo.mark_synced(&response_id, None, now).await.unwrap());

        let err = service.create_file(signature(&response_id)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(service.list_for_response(&response_id).await.unwrap().is_empty());
        assert_eq!(repo.summary().await.unwrap().total(), 1);
    }
}

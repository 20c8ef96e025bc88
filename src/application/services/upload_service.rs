use crate::application::ports::repositories::LocalFileRepository;
use crate::application::ports::{UploadGateway, UploadSource, UploadTicketRequest};
use crate::domain::entities::{FileContent, LocalFile, RemoteObject};
use crate::domain::value_objects::LocalFileId;
use crate::infrastructure::storage::FileStore;
use crate::shared::error::AppError;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// 二段階アップロード（チケット取得 → ストレージへ直接転送）
pub struct UploadService {
    files: Arc<dyn LocalFileRepository>,
    gateway: Arc<dyn UploadGateway>,
    file_store: FileStore,
}

impl UploadService {
    pub fn new(
        files: Arc<dyn LocalFileRepository>,
        gateway: Arc<dyn UploadGateway>,
        file_store: FileStore,
    ) -> Self {
        Self {
            files,
            gateway,
            file_store,
        }
    }

    /// Callers must not run this concurrently for the same file.
    pub async fn upload_file(&self, id: &LocalFileId) -> Result<LocalFile, AppError> {
        let file = self.require(id).await?;
        if file.is_uploaded() {
            return Ok(file);
        }
        let content = file.content.clone().ok_or_else(|| {
            AppError::InvalidInput(format!("File {id} has no local content to upload"))
        })?;

        // ネットワークより先に uploading を記録し、中断を検出可能にする
        self.files.mark_uploading(id).await?;

        match self.transfer(&file, &content).await {
            Ok(remote) => {
                self.files.mark_uploaded(id, &remote, Utc::now()).await?;
                tracing::info!(
                    file_id = %id,
                    object_id = %remote.object_id,
                    "file uploaded"
                );
                self.require(id).await
            }
            Err(err) => {
                if let Err(mark_err) = self.files.mark_upload_error(id, &err.to_string()).await {
                    tracing::error!(file_id = %id, error = %mark_err, "failed to record upload error");
                }
                tracing::warn!(file_id = %id, error = %err, "file upload failed");
                Err(err)
            }
        }
    }

    /// Uploads one file at a time. Failures are left for the next pass.
    pub async fn upload_pending_files(&self, limit: u32) -> Result<u32, AppError> {
        let candidates = self.files.list_uploadable_files(limit).await?;

        let mut uploaded = 0;
        for file in candidates {
            if self.upload_file(&file.id).await.is_ok() {
                uploaded += 1;
            }
        }
        Ok(uploaded)
    }

    async fn transfer(
        &self,
        file: &LocalFile,
        content: &FileContent,
    ) -> Result<RemoteObject, AppError> {
        let materialized = self.file_store.materialize(content, &file.mime_type).await?;
        let result = self.request_and_transfer(file, materialized.path.clone()).await;
        self.file_store.release(&materialized).await;
        result
    }

    async fn request_and_transfer(
        &self,
        file: &LocalFile,
        path: PathBuf,
    ) -> Result<RemoteObject, AppError> {
        let ticket = self
            .gateway
            .request_upload_ticket(&UploadTicketRequest {
                client_id: file.id.to_string(),
                file_name: file.file_name.clone(),
                file_size: file.size_bytes,
                mime_type: file.mime_type.clone(),
                metadata: json!({
                    "response_id": file.response_id.as_str(),
                    "question_id": file.question_id,
                    "kind": file.kind.as_str(),
                }),
            })
            .await?;

        if ticket.is_expired(Utc::now()) {
            return Err(AppError::Network(format!(
                "Upload ticket {} expired at {}",
                ticket.document_id, ticket.expires_at
            )));
        }

        let source = UploadSource {
            path,
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
        };
        self.gateway.transfer_to_storage(&ticket, &source).await
    }

    async fn require(&self, id: &LocalFileId) -> Result<LocalFile, AppError> {
        self.files
            .get_file(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {id} not found")))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeUploadGateway;
    use super::*;
    use crate::application::ports::repositories::ResponseRepository;
    use crate::application::services::FileService;
    use crate::domain::entities::{NewLocalFile, NewSurveyResponse};
    use crate::domain::value_objects::{FileKind, FileSyncStatus, ResponseId};
    use crate::infrastructure::database::SqliteRepository;
    use crate::infrastructure::database::sqlite_repository::test_support::setup_repository;
    use tempfile::TempDir;

    struct Fixture {
        repo: Arc<SqliteRepository>,
        files: FileService,
        gateway: Arc<FakeUploadGateway>,
        response_id: ResponseId,
        dir: TempDir,
    }

    impl Fixture {
        fn uploads(&self) -> UploadService {
            UploadService::new(
                self.repo.clone(),
                self.gateway.clone(),
                FileStore::new(self.dir.path()),
            )
        }
    }

    async fn setup(gateway: FakeUploadGateway) -> Fixture {
        let repo = setup_repository().await;
        let response = NewSurveyResponse::new("S1", "v1", "user-1")
            .into_response(ResponseId::generate(), Utc::now());
        repo.insert_response(&response).await.unwrap();
        let dir = TempDir::new().unwrap();
        Fixture {
            files: FileService::new(repo.clone(), FileStore::new(dir.path()), 3),
            repo,
            gateway: Arc::new(gateway),
            response_id: response.id,
            dir,
        }
    }

    fn signature(response_id: &ResponseId) -> NewLocalFile {
        NewLocalFile {
            response_id: response_id.clone(),
            question_id: "q_signature".into(),
            kind: FileKind::Signature,
            content: FileContent::inline("QUJD"),
            file_name: None,
            mime_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn test_inline_upload_uses_temp_file() {
        let fixture = setup(FakeUploadGateway::default()).await;
        let file = fixture
            .files
            .create_file(signature(&fixture.response_id))
            .await
            .unwrap();

        let uploaded = fixture.uploads().upload_file(&file.id).await.unwrap();
        assert_eq!(uploaded.sync_status, FileSyncStatus::Uploaded);
        let remote = uploaded.remote.unwrap();
        assert_eq!(remote.object_id, format!("obj-{}", file.id));
        assert_eq!(uploaded.upload_attempts, 1);

        let transferred = fixture.gateway.transferred.lock().unwrap().clone();
        assert_eq!(transferred, vec![(file.file_name.clone(), b"ABC".to_vec())]);

        let tickets = fixture.gateway.tickets.lock().unwrap().clone();
        assert_eq!(tickets[0].file_size, 3);
        assert_eq!(tickets[0].metadata["question_id"], "q_signature");

        // 一時ファイルは転送後に消える
        let mut leftovers = tokio::fs::read_dir(fixture.dir.path().join("tmp")).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uploaded_file_skips_network() {
        let fixture = setup(FakeUploadGateway::default()).await;
        let file = fixture
            .files
            .create_file(signature(&fixture.response_id))
            .await
            .unwrap();
        let service = fixture.uploads();
        service.upload_file(&file.id).await.unwrap();
        service.upload_file(&file.id).await.unwrap();

        assert_eq!(fixture.gateway.tickets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_transfer_marks_error() {
        let gateway = FakeUploadGateway::default();
        *gateway.fail_transfer.lock().unwrap() = Some(AppError::Network("reset".into()));
        let fixture = setup(gateway).await;
        let file = fixture
            .files
            .create_file(signature(&fixture.response_id))
            .await
            .unwrap();

        let err = fixture.uploads().upload_file(&file.id).await.unwrap_err();
        assert!(err.is_transient());

        let stored = fixture.files.get_file(&file.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, FileSyncStatus::Error);
        assert!(stored.remote.is_none());
        assert!(stored.last_error.unwrap().contains("reset"));
    }

    #[tokio::test]
    async fn test_expired_ticket_is_an_error() {
        let fixture = setup(FakeUploadGateway {
            expired_ticket: true,
            ..Default::default()
        })
        .await;
        let file = fixture
            .files
            .create_file(signature(&fixture.response_id))
            .await
            .unwrap();

        assert!(fixture.uploads().upload_file(&file.id).await.is_err());
        assert!(fixture.gateway.transferred.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_pending_files_counts_successes() {
        let gateway = FakeUploadGateway::default();
        *gateway.fail_transfer.lock().unwrap() = Some(AppError::Network("flaky".into()));
        let fixture = setup(gateway).await;
        for _ in 0..3 {
            fixture
                .files
                .create_file(signature(&fixture.response_id))
                .await
                .unwrap();
        }

        let service = fixture.uploads();
        assert_eq!(service.upload_pending_files(10).await.unwrap(), 2);
        // 失敗した1件は次のパスで再送される
        assert_eq!(service.upload_pending_files(10).await.unwrap(), 1);
        assert_eq!(service.upload_pending_files(10).await.unwrap(), 0);
    }
}

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub(super) struct ResponseRow {
    pub id: String,
    pub survey_id: String,
    pub survey_version: String,
    pub user_id: String,
    pub assignment_id: Option<String>,
    pub status: String,
    pub answers: String,
    pub device_info: Option<String>,
    pub location: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub sync_status: String,
    pub sync_attempts: i64,
    pub last_sync_error: Option<String>,
    pub last_synced_at: Option<i64>,
    pub remote_response_id: Option<String>,
    pub immutable: bool,
    pub content_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct LocalFileRow {
    pub id: String,
    pub response_id: String,
    pub question_id: String,
    pub kind: String,
    pub local_path: Option<String>,
    pub inline_data: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sync_status: String,
    pub upload_attempts: i64,
    pub last_error: Option<String>,
    pub remote_object_id: Option<String>,
    pub remote_version: Option<String>,
    pub remote_url: Option<String>,
    pub extraction: Option<String>,
    pub uploaded_at: Option<i64>,
    pub local_purged_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct SyncQueueRow {
    pub id: i64,
    pub operation_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: String,
    pub status: String,
    pub priority: i64,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct CacheRow {
    pub key: String,
    pub value: String,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

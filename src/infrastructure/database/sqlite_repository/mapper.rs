use super::rows::{CacheRow, LocalFileRow, ResponseRow, SyncQueueRow};
use crate::domain::entities::{
    CacheEntry, FileContent, LocalFile, RemoteObject, SurveyResponse, SyncQueueItem,
};
use crate::domain::value_objects::{
    AnswerMap, EntityType, FileKind, FileSyncStatus, LocalFileId, QueuePayload, ResponseId,
    ResponseStatus, ResponseSyncStatus, SyncOperationType, SyncQueueId, SyncQueueStatus,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub(super) fn to_datetime(millis: i64, field: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Internal(format!("Invalid {field} timestamp: {millis}")))
}

pub(super) fn to_optional_datetime(
    millis: Option<i64>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    millis.map(|value| to_datetime(value, field)).transpose()
}

fn to_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
    field: &str,
) -> Result<Option<T>, AppError> {
    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| AppError::DeserializationError(format!("Invalid {field}: {e}")))
    })
    .transpose()
}

pub(super) fn response_from_row(row: ResponseRow) -> Result<SurveyResponse, AppError> {
    Ok(SurveyResponse {
        id: ResponseId::new(row.id).map_err(AppError::Internal)?,
        survey_id: row.survey_id,
        survey_version: row.survey_version,
        user_id: row.user_id,
        assignment_id: row.assignment_id,
        status: ResponseStatus::from_value(&row.status),
        answers: AnswerMap::from_json_str(&row.answers).map_err(AppError::DeserializationError)?,
        device_info: parse_json_column(row.device_info, "device_info")?,
        location: parse_json_column(row.location, "location")?,
        started_at: to_datetime(row.started_at, "started_at")?,
        completed_at: to_optional_datetime(row.completed_at, "completed_at")?,
        duration_seconds: row.duration_seconds,
        sync_status: ResponseSyncStatus::from_value(&row.sync_status),
        sync_attempts: to_u32(row.sync_attempts),
        last_sync_error: row.last_sync_error,
        last_synced_at: to_optional_datetime(row.last_synced_at, "last_synced_at")?,
        remote_response_id: row.remote_response_id,
        immutable: row.immutable,
        content_hash: row.content_hash,
        created_at: to_datetime(row.created_at, "created_at")?,
        updated_at: to_datetime(row.updated_at, "updated_at")?,
    })
}

pub(super) fn local_file_from_row(row: LocalFileRow) -> Result<LocalFile, AppError> {
    let content = match (row.local_path, row.inline_data) {
        (Some(path), _) => Some(FileContent::path(path)),
        (None, Some(data)) => Some(FileContent::inline(data)),
        (None, None) => None,
    };
    // 片方だけ NULL の行は不完全な書き込みとみなして remote を持たせない
    let remote = match (row.remote_object_id, row.remote_url) {
        (Some(object_id), Some(url)) => Some(RemoteObject {
            object_id,
            version: row.remote_version,
            url,
        }),
        _ => None,
    };

    Ok(LocalFile {
        id: LocalFileId::new(row.id).map_err(AppError::Internal)?,
        response_id: ResponseId::new(row.response_id).map_err(AppError::Internal)?,
        question_id: row.question_id,
        kind: FileKind::from_value(&row.kind),
        content,
        file_name: row.file_name,
        mime_type: row.mime_type,
        size_bytes: row.size_bytes.max(0) as u64,
        sync_status: FileSyncStatus::from_value(&row.sync_status),
        upload_attempts: to_u32(row.upload_attempts),
        last_error: row.last_error,
        remote,
        extraction: parse_json_column(row.extraction, "extraction")?,
        uploaded_at: to_optional_datetime(row.uploaded_at, "uploaded_at")?,
        local_purged_at: to_optional_datetime(row.local_purged_at, "local_purged_at")?,
        created_at: to_datetime(row.created_at, "created_at")?,
        updated_at: to_datetime(row.updated_at, "updated_at")?,
    })
}

pub(super) fn queue_item_from_row(row: SyncQueueRow) -> Result<SyncQueueItem, AppError> {
    Ok(SyncQueueItem {
        id: SyncQueueId::new(row.id).map_err(AppError::Internal)?,
        operation_type: SyncOperationType::from(row.operation_type.as_str()),
        entity_type: EntityType::from(row.entity_type.as_str()),
        entity_id: row.entity_id,
        payload: QueuePayload::from_json_str(&row.payload)
            .map_err(AppError::DeserializationError)?,
        status: SyncQueueStatus::from(row.status.as_str()),
        priority: row.priority.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        retry_count: to_u32(row.retry_count),
        max_retries: to_u32(row.max_retries),
        next_retry_at: to_optional_datetime(row.next_retry_at, "next_retry_at")?,
        last_error: row.last_error,
        created_at: to_datetime(row.created_at, "created_at")?,
        updated_at: to_datetime(row.updated_at, "updated_at")?,
        completed_at: to_optional_datetime(row.completed_at, "completed_at")?,
    })
}

pub(super) fn cache_entry_from_row(row: CacheRow) -> Result<CacheEntry, AppError> {
    Ok(CacheEntry {
        key: row.key,
        value: row.value,
        expires_at: to_optional_datetime(row.expires_at, "expires_at")?,
        created_at: to_datetime(row.created_at, "created_at")?,
        updated_at: to_datetime(row.updated_at, "updated_at")?,
    })
}

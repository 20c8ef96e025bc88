use crate::domain::value_objects::{
    EntityType, QueuePayload, SyncOperationType, SyncQueueId, SyncQueueStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SUBMIT_RESPONSE_PRIORITY: i32 = 10;
pub const UPLOAD_FILE_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncQueueItem {
    pub id: SyncQueueId,
    pub operation_type: SyncOperationType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: QueuePayload,
    pub status: SyncQueueStatus,
    pub priority: i32,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncQueueItem {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == SyncQueueStatus::Pending
            && self.next_retry_at.map(|at| at <= now).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct SyncQueueItemDraft {
    pub operation_type: SyncOperationType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: QueuePayload,
    pub priority: i32,
    pub max_retries: u32,
}

impl SyncQueueItemDraft {
    pub fn submit_response(response_id: &str, max_retries: u32) -> Self {
        Self {
            operation_type: SyncOperationType::SubmitResponse,
            entity_type: EntityType::Response,
            entity_id: response_id.to_string(),
            payload: object_payload(&[("response_id", response_id)]),
            priority: SUBMIT_RESPONSE_PRIORITY,
            max_retries,
        }
    }

    pub fn upload_file(file_id: &str, response_id: &str, max_retries: u32) -> Self {
        Self {
            operation_type: SyncOperationType::UploadFile,
            entity_type: EntityType::LocalFile,
            entity_id: file_id.to_string(),
            payload: object_payload(&[("file_id", file_id), ("response_id", response_id)]),
            priority: UPLOAD_FILE_PRIORITY,
            max_retries,
        }
    }
}

fn object_payload(fields: &[(&str, &str)]) -> QueuePayload {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    QueuePayload::from(map)
}

/// ステータスごとの件数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueSummary {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

use crate::domain::entities::RemoteObject;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 署名付きアップロードチケットの要求。バイト列は含めない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTicketRequest {
    pub client_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub document_id: String,
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub signing_fields: BTreeMap<String, String>,
    pub generated_object_id: String,
}

impl UploadTicket {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 転送するローカルファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
}

/// 二段階アップロード（チケット取得 → ストレージへの直接転送）
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn request_upload_ticket(
        &self,
        request: &UploadTicketRequest,
    ) -> Result<UploadTicket, AppError>;

    async fn transfer_to_storage(
        &self,
        ticket: &UploadTicket,
        source: &UploadSource,
    ) -> Result<RemoteObject, AppError>;
}

use crate::domain::value_objects::{FileKind, FileSyncStatus, LocalFileId, ResponseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// ローカルに保持しているメディアの中身への参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileContent {
    /// ファイルシステム上のパス
    Path { path: PathBuf },
    /// 署名など小さいキャプチャの base64 データ（data URI 可）
    Inline { data: String },
}

impl FileContent {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileContent::Path { path: path.into() }
    }

    pub fn inline(data: impl Into<String>) -> Self {
        FileContent::Inline { data: data.into() }
    }

    /// Strips a `data:<mime>;base64,` prefix when present.
    pub fn inline_payload(data: &str) -> &str {
        match data.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => data,
        }
    }
}

/// アップロード後にストレージ側で確定したオブジェクト情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub object_id: String,
    pub version: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalFile {
    pub id: LocalFileId,
    pub response_id: ResponseId,
    pub question_id: String,
    pub kind: FileKind,
    pub content: Option<FileContent>,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub sync_status: FileSyncStatus,
    pub upload_attempts: u32,
    pub last_error: Option<String>,
    pub remote: Option<RemoteObject>,
    pub extraction: Option<Value>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub local_purged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalFile {
    pub fn is_uploaded(&self) -> bool {
        self.sync_status == FileSyncStatus::Uploaded
    }
}

#[derive(Debug, Clone)]
pub struct NewLocalFile {
    pub response_id: ResponseId,
    pub question_id: String,
    pub kind: FileKind,
    pub content: FileContent,
    pub file_name: Option<String>,
    pub mime_type: String,
}

impl NewLocalFile {
    pub fn validate(&self) -> Result<(), String> {
        if self.question_id.trim().is_empty() {
            return Err("Question id is required".to_string());
        }
        if !self.mime_type.contains('/') {
            return Err(format!("Invalid mime type: {}", self.mime_type));
        }
        match &self.content {
            FileContent::Path { path } if path.as_os_str().is_empty() => {
                Err("File path cannot be empty".to_string())
            }
            FileContent::Inline { data } if data.trim().is_empty() => {
                Err("Inline content cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn resolved_file_name(&self, id: &LocalFileId) -> String {
        if let Some(name) = self.file_name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
        if let FileContent::Path { path } = &self.content {
            if let Some(name) = path.file_name() {
                return name.to_string_lossy().into_owned();
            }
        }
        format!("{}-{}.{}", self.kind, id, extension_for_mime(&self.mime_type))
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "application/pdf" => "pdf",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

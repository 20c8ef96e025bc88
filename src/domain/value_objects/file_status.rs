use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSyncStatus {
    Pending,
    Uploading,
    Uploaded,
    Error,
}

impl FileSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSyncStatus::Pending => "pending",
            FileSyncStatus::Uploading => "uploading",
            FileSyncStatus::Uploaded => "uploaded",
            FileSyncStatus::Error => "error",
        }
    }

    pub fn from_value(value: &str) -> Self {
        match value {
            "uploading" => FileSyncStatus::Uploading,
            "uploaded" => FileSyncStatus::Uploaded,
            "error" => FileSyncStatus::Error,
            _ => FileSyncStatus::Pending,
        }
    }
}

impl fmt::Display for FileSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 撮影・取得したメディアの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Photo,
    Signature,
    DocumentFront,
    DocumentBack,
    File,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Photo => "photo",
            FileKind::Signature => "signature",
            FileKind::DocumentFront => "document_front",
            FileKind::DocumentBack => "document_back",
            FileKind::File => "file",
        }
    }

    pub fn from_value(value: &str) -> Self {
        match value {
            "photo" => FileKind::Photo,
            "signature" => FileKind::Signature,
            "document_front" => FileKind::DocumentFront,
            "document_back" => FileKind::DocumentBack,
            _ => FileKind::File,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

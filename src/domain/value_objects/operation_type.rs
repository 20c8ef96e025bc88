use serde::{Deserialize, Serialize};
use std::fmt;

/// 同期キューで扱うジョブ種別
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncOperationType {
    SubmitResponse,
    UploadFile,
    Unknown(String),
}

impl SyncOperationType {
    pub fn as_str(&self) -> &str {
        match self {
            SyncOperationType::SubmitResponse => "submit_response",
            SyncOperationType::UploadFile => "upload_file",
            SyncOperationType::Unknown(value) => value.as_str(),
        }
    }
}

impl fmt::Display for SyncOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for SyncOperationType {
    fn from(value: &str) -> Self {
        match value {
            "submit_response" => SyncOperationType::SubmitResponse,
            "upload_file" => SyncOperationType::UploadFile,
            other => SyncOperationType::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Response,
    LocalFile,
    Unknown(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Response => "response",
            EntityType::LocalFile => "local_file",
            EntityType::Unknown(value) => value.as_str(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EntityType {
    fn from(value: &str) -> Self {
        match value {
            "response" => EntityType::Response,
            "local_file" => EntityType::LocalFile,
            other => EntityType::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_round_trips_raw_value() {
        let op = SyncOperationType::from("reindex");
        assert_eq!(op, SyncOperationType::Unknown("reindex".into()));
        assert_eq!(op.as_str(), "reindex");
    }
}

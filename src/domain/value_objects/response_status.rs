use serde::{Deserialize, Serialize};
use std::fmt;

/// 回答のライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Draft,
    Completed,
    Validated,
    Rejected,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Draft => "draft",
            ResponseStatus::Completed => "completed",
            ResponseStatus::Validated => "validated",
            ResponseStatus::Rejected => "rejected",
        }
    }

    pub fn from_value(value: &str) -> Self {
        match value {
            "completed" => ResponseStatus::Completed,
            "validated" => ResponseStatus::Validated,
            "rejected" => ResponseStatus::Rejected,
            _ => ResponseStatus::Draft,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 回答の送信状態。ライフサイクルとは独立に遷移する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl ResponseSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSyncStatus::Pending => "pending",
            ResponseSyncStatus::Syncing => "syncing",
            ResponseSyncStatus::Synced => "synced",
            ResponseSyncStatus::Error => "error",
        }
    }

    pub fn from_value(value: &str) -> Self {
        match value {
            "syncing" => ResponseSyncStatus::Syncing,
            "synced" => ResponseSyncStatus::Synced,
            "error" => ResponseSyncStatus::Error,
            _ => ResponseSyncStatus::Pending,
        }
    }
}

impl fmt::Display for ResponseSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 送信後のサーバー側審査結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Validated,
    Rejected,
}

impl From<ReviewOutcome> for ResponseStatus {
    fn from(outcome: ReviewOutcome) -> Self {
        match outcome {
            ReviewOutcome::Validated => ResponseStatus::Validated,
            ReviewOutcome::Rejected => ResponseStatus::Rejected,
        }
    }
}

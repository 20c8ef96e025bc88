use crate::domain::value_objects::{DeviceInfo, GeoLocation};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAnswer {
    pub question_id: String,
    pub answer_value: Value,
    pub answered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// バッチ送信の1件分。`client_id` がサーバー側の冪等キーになる
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionItem {
    pub client_id: String,
    pub version_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    pub answers: Vec<SubmissionAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Duplicate,
    Failed,
    #[serde(other)]
    Unknown,
}

impl SubmissionStatus {
    /// `duplicate` は以前の送信が既に受理されていることを意味する
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionStatus::Success | SubmissionStatus::Duplicate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionItemResult {
    pub client_id: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub warnings: Vec<Value>,
}

impl SubmissionItemResult {
    pub fn failure_summary(&self) -> String {
        let mut summary = self
            .message
            .clone()
            .unwrap_or_else(|| "Submission rejected by server".to_string());
        if !self.errors.is_empty() {
            let details: Vec<String> = self.errors.iter().map(render_detail).collect();
            summary.push_str(": ");
            summary.push_str(&details.join("; "));
        }
        summary
    }
}

fn render_detail(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmissionResult {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub duplicates: u32,
    pub results: Vec<SubmissionItemResult>,
}

impl BatchSubmissionResult {
    pub fn result_for(&self, client_id: &str) -> Option<&SubmissionItemResult> {
        self.results.iter().find(|r| r.client_id == client_id)
    }
}

/// 回答送信先のバックエンド
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit_batch(
        &self,
        items: &[SubmissionItem],
    ) -> Result<BatchSubmissionResult, AppError>;
}

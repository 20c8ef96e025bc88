use crate::domain::value_objects::{
    AnswerMap, DeviceInfo, GeoLocation, ResponseId, ResponseStatus, ResponseSyncStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: String,
    pub survey_version: String,
    pub user_id: String,
    pub assignment_id: Option<String>,
    pub status: ResponseStatus,
    pub answers: AnswerMap,
    pub device_info: Option<DeviceInfo>,
    pub location: Option<GeoLocation>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub sync_status: ResponseSyncStatus,
    pub sync_attempts: u32,
    pub last_sync_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub remote_response_id: Option<String>,
    pub immutable: bool,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SurveyResponse {
    pub fn is_synced(&self) -> bool {
        self.sync_status == ResponseSyncStatus::Synced
    }

    /// 回答の上書きが許される状態かどうか
    pub fn accepts_answer_updates(&self) -> Result<(), String> {
        if self.immutable {
            return Err(format!("Response {} is frozen", self.id));
        }
        match self.sync_status {
            ResponseSyncStatus::Syncing | ResponseSyncStatus::Synced => Err(format!(
                "Response {} is already {}",
                self.id, self.sync_status
            )),
            _ => match self.status {
                ResponseStatus::Draft | ResponseStatus::Completed => Ok(()),
                other => Err(format!("Response {} is {}", self.id, other)),
            },
        }
    }

    pub fn is_deletable(&self) -> bool {
        self.status == ResponseStatus::Draft && !self.is_synced()
    }
}

/// 新規回答の作成パラメータ
#[derive(Debug, Clone)]
pub struct NewSurveyResponse {
    pub survey_id: String,
    pub survey_version: String,
    pub user_id: String,
    pub assignment_id: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub location: Option<GeoLocation>,
}

impl NewSurveyResponse {
    pub fn new(survey_id: &str, survey_version: &str, user_id: &str) -> Self {
        Self {
            survey_id: survey_id.to_string(),
            survey_version: survey_version.to_string(),
            user_id: user_id.to_string(),
            assignment_id: None,
            device_info: None,
            location: None,
        }
    }

    pub fn with_assignment(mut self, assignment_id: &str) -> Self {
        self.assignment_id = Some(assignment_id.to_string());
        self
    }

    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = Some(device_info);
        self
    }

    pub fn with_location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.survey_id.trim().is_empty() {
            return Err("Survey id is required".to_string());
        }
        if self.survey_version.trim().is_empty() {
            return Err("Survey version is required".to_string());
        }
        if self.user_id.trim().is_empty() {
            return Err("User id is required".to_string());
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }

    pub fn into_response(self, id: ResponseId, now: DateTime<Utc>) -> SurveyResponse {
        SurveyResponse {
            id,
            survey_id: self.survey_id,
            survey_version: self.survey_version,
            user_id: self.user_id,
            assignment_id: self.assignment_id,
            status: ResponseStatus::Draft,
            answers: AnswerMap::new(),
            device_info: self.device_info,
            location: self.location,
            started_at: now,
            completed_at: None,
            duration_seconds: None,
            sync_status: ResponseSyncStatus::Pending,
            sync_attempts: 0,
            last_sync_error: None,
            last_synced_at: None,
            remote_response_id: None,
            immutable: false,
            content_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SurveyResponse {
        NewSurveyResponse::new("S1", "v1", "user-1").into_response(ResponseId::generate(), Utc::now())
    }

    #[test]
    fn new_response_starts_as_pending_draft() {
        let response = draft();
        assert_eq!(response.status, ResponseStatus::Draft);
        assert_eq!(response.sync_status, ResponseSyncStatus::Pending);
        assert!(response.answers.is_empty());
        assert!(response.is_deletable());
    }

    #[test]
    fn synced_or_frozen_responses_reject_updates() {
        let mut response = draft();
        assert!(response.accepts_answer_updates().is_ok());

        response.sync_status = ResponseSyncStatus::Synced;
        assert!(response.accepts_answer_updates().is_err());

        let mut frozen = draft();
        frozen.immutable = true;
        assert!(frozen.accepts_answer_updates().is_err());
    }

    #[test]
    fn validate_requires_identifiers() {
        assert!(NewSurveyResponse::new("", "v1", "u").validate().is_err());
        assert!(NewSurveyResponse::new("S1", "v1", "u").validate().is_ok());
    }
}

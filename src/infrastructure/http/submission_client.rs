use super::{build_client, endpoint, ensure_success, with_bearer};
use crate::application::ports::{
    AuthTokenSource, BatchSubmissionResult, SubmissionGateway, SubmissionItem,
};
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// バッチ送信 API のクライアント
pub struct HttpSubmissionGateway {
    client: Client,
    url: String,
    auth: Arc<dyn AuthTokenSource>,
}

impl HttpSubmissionGateway {
    pub fn try_new(config: &ApiConfig, auth: Arc<dyn AuthTokenSource>) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config)?,
            url: endpoint(&config.base_url, &config.submission_path),
            auth,
        })
    }
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit_batch(
        &self,
        items: &[SubmissionItem],
    ) -> Result<BatchSubmissionResult, AppError> {
        let request = with_bearer(self.client.post(&self.url), self.auth.as_ref()).await;
        let response = request.json(items).send().await?;
        let response = ensure_success(response, "Submission endpoint").await?;

        let result = response.json::<BatchSubmissionResult>().await?;
        tracing::debug!(
            total = result.total,
            successful = result.successful,
            duplicates = result.duplicates,
            failed = result.failed,
            "batch submission answered"
        );
        Ok(result)
    }
}

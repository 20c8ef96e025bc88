pub mod submission_client;
pub mod upload_client;

pub use submission_client::HttpSubmissionGateway;
pub use upload_client::HttpUploadGateway;

use crate::application::ports::AuthTokenSource;
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 512;

fn build_client(config: &ApiConfig) -> Result<Client, AppError> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| AppError::ConfigurationError(format!("Failed to build http client: {e}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

async fn with_bearer(request: RequestBuilder, auth: &dyn AuthTokenSource) -> RequestBuilder {
    match auth.access_token().await {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// 認証切れ・タイムアウト・サーバー側障害は再試行可能として扱う
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
        )
}

async fn ensure_success(response: Response, what: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("{what} returned {status}: {body}");
    if is_retryable_status(status) {
        Err(AppError::Network(message))
    } else {
        Err(AppError::ValidationError(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(
            endpoint("http://api.local/", "/api/v1/responses/batch"),
            "http://api.local/api/v1/responses/batch"
        );
        assert_eq!(endpoint("http://api.local", "x"), "http://api.local/x");
    }

    #[test]
    fn auth_and_server_failures_are_retryable() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
    }
}

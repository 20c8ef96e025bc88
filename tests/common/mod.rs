#![allow(dead_code)]

use fieldsync_lib::application::ports::NoAuth;
use fieldsync_lib::infrastructure::http::{HttpSubmissionGateway, HttpUploadGateway};
use fieldsync_lib::{AppConfig, AppState};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use wiremock::{Request, ResponseTemplate};

pub fn test_config(data_dir: &Path, base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = data_dir.to_string_lossy().into_owned();
    config.database.url = format!("sqlite:{}/fieldsync.db", data_dir.display());
    config.sync.auto_sync = false;
    config.sync.max_retries = 3;
    config.api.base_url = base_url.to_string();
    config.api.request_timeout_secs = 5;
    config
}

pub async fn open_state(config: AppConfig) -> AppState {
    let auth = Arc::new(NoAuth);
    let submissions = Arc::new(HttpSubmissionGateway::try_new(&config.api, auth.clone()).unwrap());
    let uploads = Arc::new(HttpUploadGateway::try_new(&config.api, auth).unwrap());
    AppState::new(config, submissions, uploads).await.unwrap()
}

/// 送られてきた全件を success で返すバックエンド
pub fn accept_all(request: &Request) -> ResponseTemplate {
    let items: Vec<Value> = serde_json::from_slice(&request.body).unwrap();
    let results: Vec<Value> = items
        .iter()
        .map(|item| {
            let client_id = item["client_id"].as_str().unwrap();
            json!({
                "client_id": client_id,
                "status": "success",
                "response_id": format!("srv-{client_id}"),
            })
        })
        .collect();

    ResponseTemplate::new(200).set_body_json(json!({
        "total": results.len(),
        "successful": results.len(),
        "failed": 0,
        "duplicates": 0,
        "results": results,
    }))
}

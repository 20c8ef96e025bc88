mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{accept_all, open_state, test_config};
use fieldsync_lib::domain::entities::{FileContent, NewLocalFile, NewSurveyResponse};
use fieldsync_lib::domain::value_objects::{
    AnswerMap, CacheKey, FileKind, FileSyncStatus, ResponseStatus, ResponseSyncStatus,
};
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn answers(pairs: &[(&str, Value)]) -> AnswerMap {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

#[tokio::test]
async fn completed_response_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/responses/batch"))
        .respond_with(accept_all)
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state = open_state(test_config(dir.path(), &server.uri())).await;
    let responses = &state.response_service;

    let id = responses
        .create_response(NewSurveyResponse::new("S1", "v3", "enumerator-7"))
        .await
        .unwrap();
    responses
        .update_answers(&id, answers(&[("q1", json!("yes"))]))
        .await
        .unwrap();
    responses
        .update_answers(&id, answers(&[("q1", json!("no")), ("q2", json!(4))]))
        .await
        .unwrap();
    responses.complete_response(&id).await.unwrap();

    let report = state.scheduler.run_once().await.unwrap();
    assert_eq!(report.submitted, 1);

    let synced = responses.get_response_by_id(&id).await.unwrap().unwrap();
    assert_eq!(synced.status, ResponseStatus::Completed);
    assert_eq!(synced.sync_status, ResponseSyncStatus::Synced);
    assert_eq!(synced.remote_response_id, Some(format!("srv-{id}")));

    let requests = server.received_requests().await.unwrap();
    let body: Vec<Value> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body[0]["client_id"], json!(id.to_string()));
    assert_eq!(body[0]["version_id"], json!("v3"));
    assert_eq!(body[0]["answers"].as_array().unwrap().len(), 2);

    // 同期済みの回答は編集できない
    assert!(responses
        .update_answers(&id, answers(&[("q1", json!("maybe"))]))
        .await
        .is_err());
}

#[tokio::test]
async fn unreachable_backend_keeps_work_queued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/responses/batch"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state = open_state(test_config(dir.path(), &server.uri())).await;

    let id = state
        .response_service
        .create_response(NewSurveyResponse::new("S1", "v1", "enumerator-7"))
        .await
        .unwrap();
    state.response_service.complete_response(&id).await.unwrap();

    let report = state.scheduler.run_once().await.unwrap();
    assert_eq!(report.submission_failures, 1);

    let response = state
        .response_service
        .get_response_by_id(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.sync_status, ResponseSyncStatus::Error);
    assert!(response.last_sync_error.unwrap().contains("503"));

    let summary = state.sync_queue_service.queue_summary().await.unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn media_is_uploaded_before_its_response() {
    let server = MockServer::start().await;
    let expires_at = Utc::now() + ChronoDuration::minutes(15);
    Mock::given(method("POST"))
        .and(path("/api/v1/uploads/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document_id": "doc-1",
            "upload_url": format!("{}/storage", server.uri()),
            "expires_at": expires_at,
            "signing_fields": {"key": "media/obj-1", "policy": "p"},
            "generated_object_id": "obj-1",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage"))
        .respond_with(ResponseTemplate::new(204).insert_header("x-amz-version-id", "ver-9"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/responses/batch"))
        .respond_with(accept_all)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state = open_state(test_config(dir.path(), &server.uri())).await;

    let id = state
        .response_service
        .create_response(NewSurveyResponse::new("S1", "v1", "enumerator-7"))
        .await
        .unwrap();
    state
        .response_service
        .update_answers(&id, answers(&[("q_photo", json!("captured"))]))
        .await
        .unwrap();
    let file = state
        .file_service
        .create_file(NewLocalFile {
            response_id: id.clone(),
            question_id: "q_photo".into(),
            kind: FileKind::Photo,
            content: FileContent::inline("data:image/jpeg;base64,/9j/AA=="),
            file_name: None,
            mime_type: "image/jpeg".into(),
        })
        .await
        .unwrap();
    state.response_service.complete_response(&id).await.unwrap();

    let report = state.scheduler.run_once().await.unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.submitted, 1);

    let uploaded = state.file_service.get_file(&file.id).await.unwrap().unwrap();
    assert_eq!(uploaded.sync_status, FileSyncStatus::Uploaded);
    let remote = uploaded.remote.unwrap();
    assert_eq!(remote.object_id, "obj-1");
    assert_eq!(remote.version.as_deref(), Some("ver-9"));
    assert_eq!(remote.url, format!("{}/storage/media/obj-1", server.uri()));

    let requests = server.received_requests().await.unwrap();
    let submission = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/responses/batch")
        .unwrap();
    let body: Vec<Value> = serde_json::from_slice(&submission.body).unwrap();
    assert_eq!(body[0]["answers"][0]["media_url"], json!(remote.url));
}

#[tokio::test]
async fn restart_recovers_interrupted_work() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://127.0.0.1:9");

    let id = {
        let state = open_state(config.clone()).await;
        let id = state
            .response_service
            .create_response(NewSurveyResponse::new("S1", "v1", "enumerator-7"))
            .await
            .unwrap();
        for value in ["first", "second", "last"] {
            state
                .response_service
                .update_answers(&id, answers(&[("q1", json!(value))]))
                .await
                .unwrap();
        }
        state.response_service.complete_response(&id).await.unwrap();

        // 送信途中でプロセスが落ちた状態を作る
        let due = state
            .sync_queue_service
            .get_pending_operations(10)
            .await
            .unwrap();
        assert!(state.sync_queue_service.claim(due[0].id).await.unwrap());
        state.response_service.mark_syncing(&id).await.unwrap();
        state.shutdown().await;
        id
    };

    let state = open_state(config).await;
    let response = state
        .response_service
        .get_response_by_id(&id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.answers.get("q1"), Some(&json!("last")));
    assert_eq!(response.sync_status, ResponseSyncStatus::Pending);

    let summary = state.sync_queue_service.queue_summary().await.unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.processing, 0);
}

#[tokio::test]
async fn expired_cache_entries_read_as_missing() {
    let dir = TempDir::new().unwrap();
    let state = open_state(test_config(dir.path(), "http://127.0.0.1:9")).await;
    let cache = &state.cache_service;

    let assignments = CacheKey::assignments("enumerator-7");
    let definition = CacheKey::survey_definition("S1", "v1");
    cache
        .set_with_expiry(&assignments, &vec!["A-1", "A-2"], Some(Duration::from_millis(1)))
        .await
        .unwrap();
    cache
        .set_with_expiry(&definition, &json!({"questions": []}), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get::<Vec<String>>(&assignments).await, None);
    assert_eq!(
        cache.get::<Value>(&definition).await,
        Some(json!({"questions": []}))
    );
    assert_eq!(cache.cleanup_expired().await.unwrap(), 0);
}

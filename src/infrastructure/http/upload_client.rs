use super::{build_client, endpoint, ensure_success, with_bearer};
use crate::application::ports::{
    AuthTokenSource, UploadGateway, UploadSource, UploadTicket, UploadTicketRequest,
};
use crate::domain::entities::RemoteObject;
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;

const VERSION_ID_HEADER: &str = "x-amz-version-id";
const OBJECT_KEY_FIELD: &str = "key";

/// チケット発行はバックエンド、バイト転送はストレージへ直接行う
pub struct HttpUploadGateway {
    client: Client,
    ticket_url: String,
    auth: Arc<dyn AuthTokenSource>,
}

impl HttpUploadGateway {
    pub fn try_new(config: &ApiConfig, auth: Arc<dyn AuthTokenSource>) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config)?,
            ticket_url: endpoint(&config.base_url, &config.upload_ticket_path),
            auth,
        })
    }
}

#[async_trait]
impl UploadGateway for HttpUploadGateway {
    async fn request_upload_ticket(
        &self,
        request: &UploadTicketRequest,
    ) -> Result<UploadTicket, AppError> {
        let builder = with_bearer(self.client.post(&self.ticket_url), self.auth.as_ref()).await;
        let response = builder.json(request).send().await?;
        let response = ensure_success(response, "Upload ticket endpoint").await?;
        Ok(response.json::<UploadTicket>().await?)
    }

    async fn transfer_to_storage(
        &self,
        ticket: &UploadTicket,
        source: &UploadSource,
    ) -> Result<RemoteObject, AppError> {
        let bytes = tokio::fs::read(&source.path).await.map_err(|e| {
            AppError::Storage(format!("Cannot read {}: {e}", source.path.display()))
        })?;

        // 署名フィールドはファイル本体より前に並べる必要がある
        let mut form = Form::new();
        for (name, value) in &ticket.signing_fields {
            form = form.text(name.clone(), value.clone());
        }
        let part = Part::bytes(bytes)
            .file_name(source.file_name.clone())
            .mime_str(&source.mime_type)
            .map_err(|e| AppError::InvalidInput(format!("Invalid mime type: {e}")))?;
        form = form.part("file", part);

        let response = self
            .client
            .post(&ticket.upload_url)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response, "Object storage").await?;

        Ok(remote_object_from(ticket, response.headers()))
    }
}

fn remote_object_from(ticket: &UploadTicket, headers: &HeaderMap) -> RemoteObject {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let url = header_value(LOCATION.as_str()).unwrap_or_else(|| {
        let key = ticket
            .signing_fields
            .get(OBJECT_KEY_FIELD)
            .unwrap_or(&ticket.generated_object_id);
        format!("{}/{}", ticket.upload_url.trim_end_matches('/'), key)
    });

    RemoteObject {
        object_id: ticket.generated_object_id.clone(),
        version: header_value(VERSION_ID_HEADER),
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoAuth;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            submission_path: "/api/v1/responses/batch".to_string(),
            upload_ticket_path: "/api/v1/uploads/ticket".to_string(),
        }
    }

    fn ticket(upload_url: String) -> UploadTicket {
        let mut signing_fields = BTreeMap::new();
        signing_fields.insert("key".to_string(), "uploads/doc-1.jpg".to_string());
        signing_fields.insert("policy".to_string(), "cG9saWN5".to_string());
        UploadTicket {
            document_id: "doc-1".to_string(),
            upload_url,
            expires_at: Utc::now() + Duration::minutes(15),
            signing_fields,
            generated_object_id: "obj-1".to_string(),
        }
    }

    #[tokio::test]
    async fn ticket_request_sends_metadata_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/uploads/ticket"))
            .and(body_partial_json(json!({
                "client_id": "file-1",
                "file_name": "IMG_1.jpg",
                "file_size": 4
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "document_id": "doc-1",
                "upload_url": format!("{}/bucket", server.uri()),
                "expires_at": (Utc::now() + Duration::minutes(15)).to_rfc3339(),
                "signing_fields": {"key": "uploads/doc-1.jpg"},
                "generated_object_id": "obj-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway =
            HttpUploadGateway::try_new(&config(&server.uri()), Arc::new(NoAuth)).unwrap();
        let ticket = gateway
            .request_upload_ticket(&UploadTicketRequest {
                client_id: "file-1".to_string(),
                file_name: "IMG_1.jpg".to_string(),
                file_size: 4,
                mime_type: "image/jpeg".to_string(),
                metadata: json!({"question_id": "q_photo"}),
            })
            .await
            .unwrap();

        assert_eq!(ticket.generated_object_id, "obj-1");
        assert_eq!(ticket.signing_fields.get("key").unwrap(), "uploads/doc-1.jpg");
    }

    #[tokio::test]
    async fn transfer_reads_identity_from_storage_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bucket"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Location", "https://cdn.example/uploads/doc-1.jpg")
                    .insert_header("x-amz-version-id", "ver-3"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("IMG_1.jpg");
        tokio::fs::write(&file_path, b"JPEG").await.unwrap();

        let gateway =
            HttpUploadGateway::try_new(&config(&server.uri()), Arc::new(NoAuth)).unwrap();
        let remote = gateway
            .transfer_to_storage(
                &ticket(format!("{}/bucket", server.uri())),
                &UploadSource {
                    path: file_path,
                    file_name: "IMG_1.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(remote.object_id, "obj-1");
        assert_eq!(remote.version.as_deref(), Some("ver-3"));
        assert_eq!(remote.url, "https://cdn.example/uploads/doc-1.jpg");
    }

    #[test]
    fn url_falls_back_to_object_key() {
        let ticket = ticket("https://storage.example/bucket/".to_string());
        let remote = remote_object_from(&ticket, &HeaderMap::new());
        assert_eq!(remote.url, "https://storage.example/bucket/uploads/doc-1.jpg");
        assert!(remote.version.is_none());
    }

    #[tokio::test]
    async fn rejected_transfer_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("policy expired"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("sig.png");
        tokio::fs::write(&file_path, b"PNG").await.unwrap();

        let gateway =
            HttpUploadGateway::try_new(&config(&server.uri()), Arc::new(NoAuth)).unwrap();
        let err = gateway
            .transfer_to_storage(
                &ticket(format!("{}/bucket", server.uri())),
                &UploadSource {
                    path: file_path,
                    file_name: "sig.png".to_string(),
                    mime_type: "image/png".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("policy expired"));
    }
}

use composer_uploads_client::DirectClient;
use composer_uploads_client::ProgressReporter;
use composer_uploads_client::TransferError;
use composer_uploads_client::UploadContext;
use composer_uploads_client::UploadId;
use composer_uploads_client::UploadTransport;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::png_file;
use super::upload_json;

fn client(server: &MockServer) -> DirectClient {
    DirectClient::new(
        format!("{}/uploads/generate-presigned", server.uri()),
        format!("{}/uploads/complete-external-upload", server.uri()),
    )
    .unwrap()
    .with_csrf_token("csrf-abc")
}

#[tokio::test]
async fn presigns_stores_and_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/generate-presigned"))
        .and(header("X-CSRF-Token", "csrf-abc"))
        .and(body_json(json!({
            "filename": "photo.png",
            "content_type": "image/png",
            "file_size": 16
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "method": "put",
            "url": format!("{}/bucket/temp/photo.png", server.uri()),
            "headers": { "x-amz-acl": "private" },
            "unique_identifier": "uid-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bucket/temp/photo.png"))
        .and(header("x-amz-acl", "private"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/uploads/complete-external-upload"))
        .and(body_json(json!({ "unique_identifier": "uid-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_json("photo.png")))
        .expect(1)
        .mount(&server)
        .await;

    let upload = client(&server)
        .transfer(
            &png_file("photo.png"),
            UploadContext::default(),
            ProgressReporter::detached(UploadId::new(1)),
        )
        .await
        .unwrap();
    assert_eq!(upload.link(), "upload://abc123.png");

    let requests = server.received_requests().await.unwrap();
    let storage = requests
        .iter()
        .find(|r| r.url.path() == "/bucket/temp/photo.png")
        .unwrap();
    assert!(
        !storage.headers.contains_key("x-csrf-token"),
        "session token must not leak to the storage host"
    );
    assert_eq!(storage.body, b"not-really-a-png".to_vec());
}

#[tokio::test]
async fn storage_rejection_skips_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/generate-presigned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/bucket/temp/photo.png", server.uri()),
            "unique_identifier": "uid-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bucket/temp/photo.png"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("<Error><Code>AccessDenied</Code></Error>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/uploads/complete-external-upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_json("photo.png")))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .transfer(
            &png_file("photo.png"),
            UploadContext::default(),
            ProgressReporter::detached(UploadId::new(1)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransferError::Status {
            status: 403,
            message: String::new(),
        }
    );
}

#[tokio::test]
async fn presign_failure_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/generate-presigned"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "errors": ["You've performed this action too many times."] })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .transfer(
            &png_file("photo.png"),
            UploadContext::default(),
            ProgressReporter::detached(UploadId::new(1)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.server_message(),
        Some("You've performed this action too many times.")
    );
}

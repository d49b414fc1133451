use composer_uploads_client::MultipartClient;
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
use wiremock::matchers::body_string_contains;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

use super::png_file;
use super::upload_json;

#[tokio::test]
async fn posts_form_with_context_fields_and_decodes_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads.json"))
        .and(query_param("client_id", "client-1"))
        .and(header("X-CSRF-Token", "csrf-abc"))
        .and(body_string_contains("name=\"type\""))
        .and(body_string_contains("composer"))
        .and(body_string_contains("name=\"pasted\""))
        .and(body_string_contains("filename=\"photo.png\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_json("photo.png")))
        .expect(1)
        .mount(&server)
        .await;

    let client = MultipartClient::new(format!("{}/uploads.json", server.uri()))
        .unwrap()
        .with_client_id("client-1")
        .with_csrf_token("csrf-abc");
    let context = UploadContext {
        for_private_message: false,
        pasted: true,
    };
    let upload = client
        .transfer(
            &png_file("photo.png"),
            context,
            ProgressReporter::detached(UploadId::new(1)),
        )
        .await
        .unwrap();

    assert_eq!(upload.original_filename, "photo.png");
    assert_eq!(upload.short_url.as_deref(), Some("upload://abc123.png"));
    assert_eq!(upload.thumbnail_width, Some(100));
}

#[tokio::test]
async fn server_errors_carry_first_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads.json"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "errors": ["Sorry, the file you are trying to upload is not authorized."] })),
        )
        .mount(&server)
        .await;

    let client = MultipartClient::new(format!("{}/uploads.json", server.uri())).unwrap();
    let err = client
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
            status: 422,
            message: "Sorry, the file you are trying to upload is not authorized.".to_string(),
        }
    );
}

#[tokio::test]
async fn invalid_endpoint_is_unavailable() {
    let client = MultipartClient::new("not a url").unwrap();
    let err = client
        .transfer(
            &png_file("photo.png"),
            UploadContext::default(),
            ProgressReporter::detached(UploadId::new(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Unavailable(_)), "got {err:?}");
}

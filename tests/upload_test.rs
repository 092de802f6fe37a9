//! Multipart upload behavior: parameter values prefixed with `@` become file
//! parts, remaining parameters become text parts.

use kaiwa::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> KaiwaClient {
    KaiwaClient::new(KaiwaConfig::new("test-key").with_base_url(server.uri())).unwrap()
}

#[tokio::test]
async fn file_marker_switches_body_to_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rooms/7/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("report.txt");
    std::fs::write(&file_path, "quarterly numbers").unwrap();

    client_for(&server)
        .post_room_message(
            ParameterBag::new()
                .add("room_id", "7")
                .add("body", "report attached")
                .add("file", format!("@{}", file_path.display())),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(
        content_type.starts_with("multipart/form-data; boundary="),
        "unexpected content type: {content_type}"
    );

    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("name=\"body\""));
    assert!(body.contains("report attached"));
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"report.txt\""));
    assert!(body.contains("quarterly numbers"));
}

#[tokio::test]
async fn plain_post_stays_urlencoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rooms/7/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "2"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .post_room_message(ParameterBag::new().add("room_id", "7").add("body", "no file"))
        .await
        .unwrap();

    let request = &server.received_requests().await.unwrap()[0];
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(content_type, "application/x-www-form-urlencoded");
    assert_eq!(String::from_utf8_lossy(&request.body), "body=no%20file");
}

#[tokio::test]
async fn missing_upload_file_fails_without_sending() {
    let server = MockServer::start().await;

    let err = client_for(&server)
        .post_room_message(
            ParameterBag::new()
                .add("room_id", "7")
                .add("body", "oops")
                .add("file", "@/nowhere/missing.bin"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KaiwaError::IoError(_)), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

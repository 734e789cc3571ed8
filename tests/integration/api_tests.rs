//! API integration tests for upload, retrieval and error handling.
//!
//! Tests verify:
//! - Upload stores the file under a generated name and returns its path
//! - Retrieval returns the stored bytes with a guessed Content-Type
//! - Missing files, unsafe names and malformed uploads map to 4xx codes

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use futures::stream::{self, StreamExt};
use regex::Regex;

use image_service::RouterConfig;

use super::test_utils::{
    bearer, get_request, multipart_body, multipart_content_type, read_body, read_json, read_text,
    upload_request, valid_token, white_jpeg, white_png, TestApp, TEST_SECRET,
};

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_returns_generated_name() {
    let app = TestApp::new().await;
    let jpeg = white_jpeg(8, 8);

    let response = app
        .send(upload_request(
            Some(&valid_token()),
            &multipart_body(&[("image", Some("holiday photo.jpg"), &jpeg[..])]),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "File uploaded successfully");

    let filename = body["filename"].as_str().unwrap();
    assert!(
        Regex::new(r"^image-\d+-\d+\.jpg$").unwrap().is_match(filename),
        "unexpected filename {filename}"
    );
    assert_eq!(body["path"], format!("/images/{}", filename));
    assert_eq!(app.read_file(filename), jpeg);
}

#[tokio::test]
async fn test_upload_does_not_require_decodable_image() {
    let app = TestApp::new().await;

    let filename = app.upload("test.jpg", b"0123456789").await;

    assert!(Regex::new(r"^image-\d+-\d+\.jpg$").unwrap().is_match(&filename));
    let response = app.send(get_request(&format!("/images/{}", filename))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await.as_ref(), b"0123456789");
}

#[tokio::test]
async fn test_upload_then_retrieve_round_trip() {
    let app = TestApp::new().await;
    let png = white_png(3, 5);

    let filename = app.upload("pic.png", &png).await;

    let response = app.send(get_request(&format!("/images/{}", filename))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(read_body(response).await.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_repeated_uploads_get_distinct_names() {
    let app = TestApp::new().await;
    let png = white_png(2, 2);

    let first = app.upload("same.png", &png).await;
    let second = app.upload("same.png", &png).await;

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_upload_ignores_other_fields() {
    let app = TestApp::new().await;
    let png = white_png(2, 2);

    let response = app
        .send(upload_request(
            Some(&valid_token()),
            &multipart_body(&[
                ("caption", None, b"hello".as_slice()),
                ("image", Some("a.png"), &png[..]),
            ]),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_upload_without_image_field() {
    let app = TestApp::new().await;

    let response = app
        .send(upload_request(
            Some(&valid_token()),
            &multipart_body(&[("caption", None, b"hello".as_slice())]),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_text(response).await, "No file uploaded.");
}

#[tokio::test]
async fn test_upload_image_field_without_filename() {
    let app = TestApp::new().await;

    let response = app
        .send(upload_request(
            Some(&valid_token()),
            &multipart_body(&[("image", None, b"not a file".as_slice())]),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_non_multipart_body() {
    let app = TestApp::new().await;

    let request = Request::post("/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", valid_token()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_text(response).await, "No file uploaded.");
}

#[tokio::test]
async fn test_upload_over_limit_leaves_nothing_behind() {
    let app = TestApp::with_config(
        RouterConfig::new(Some(TEST_SECRET.to_string()))
            .with_tracing(false)
            .with_max_upload_bytes(1024),
    )
    .await;
    let big = vec![7u8; 8 * 1024];

    let response = app
        .send(upload_request(
            Some(&valid_token()),
            &multipart_body(&[("image", Some("big.png"), &big[..])]),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let leftovers = std::fs::read_dir(app.dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_abandoned_upload_leaves_nothing_behind() {
    let app = TestApp::new().await;
    let full = multipart_body(&[("image", Some("slow.png"), &[7u8; 4096][..])]);
    let head = Bytes::copy_from_slice(&full[..full.len() / 2]);

    // The client sends half the form and then stalls forever
    let body = stream::iter([Ok::<_, std::io::Error>(head)])
        .chain(stream::pending::<Result<Bytes, std::io::Error>>());
    let request = Request::post("/upload")
        .header(header::AUTHORIZATION, bearer(&valid_token()))
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from_stream(body))
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(500), app.send(request)).await;

    assert!(outcome.is_err(), "upload should still be waiting for data");
    let leftovers = std::fs::read_dir(app.dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

// =============================================================================
// Retrieval
// =============================================================================

#[tokio::test]
async fn test_missing_image_is_not_found() {
    let app = TestApp::new().await;

    let response = app.send(get_request("/images/missing.jpg")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_text(response).await, "File not found.");
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let app = TestApp::new().await;

    for uri in [
        "/images/..",
        "/images/..%2Fsecret.txt",
        "/images/%2E%2E%2F%2E%2E%2Fetc%2Fpasswd",
    ] {
        let response = app.send(get_request(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_unknown_extension_is_octet_stream() {
    let app = TestApp::new().await;
    app.put_file("blob.zzzunknown", b"data");

    let response = app.send(get_request("/images/blob.zzzunknown")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let response = app.send(get_request("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

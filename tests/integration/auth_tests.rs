//! Authentication integration tests.
//!
//! Tests verify:
//! - Missing or non-bearer Authorization headers give 401
//! - Bad, foreign or expired tokens give 403
//! - An unconfigured secret gives 500, but only once a token is presented
//! - Public routes stay reachable without a token

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use image_service::AuthClaims;

use super::test_utils::{
    edit_request, get_request, multipart_body, multipart_content_type, read_json, read_text,
    token_with, upload_request, valid_token, white_png, TestApp, TEST_SECRET,
};

fn png_upload_body() -> Vec<u8> {
    multipart_body(&[("image", Some("photo.png"), &white_png(4, 4)[..])])
}

// =============================================================================
// Missing Credentials
// =============================================================================

#[tokio::test]
async fn test_upload_without_header_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.send(upload_request(None, &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_text(response).await, "Unauthorized");
}

#[tokio::test]
async fn test_edit_without_header_is_unauthorized() {
    let app = TestApp::new().await;
    app.put_file("a.png", &white_png(4, 4));

    let response = app
        .send(edit_request("a.png", None, r#"{"text":"hi","x":0,"y":0}"#))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthorized() {
    let app = TestApp::new().await;

    let request = Request::post("/upload")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::from(png_upload_body()))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_bearer_is_unauthorized() {
    let app = TestApp::new().await;

    let request = Request::post("/upload")
        .header(header::AUTHORIZATION, "Bearer ")
        .body(Body::from(png_upload_body()))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Invalid Tokens
// =============================================================================

#[tokio::test]
async fn test_garbage_token_is_forbidden() {
    let app = TestApp::new().await;

    let response = app
        .send(upload_request(Some("not-a-jwt"), &png_upload_body()))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_text(response).await, "Forbidden");
}

#[tokio::test]
async fn test_token_from_other_secret_is_forbidden() {
    let app = TestApp::new().await;
    let token = token_with("some-other-secret", AuthClaims::for_subject("eve"), Some(3600));

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_token_is_forbidden() {
    let app = TestApp::new().await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut claims = AuthClaims::for_subject("tester");
    claims.insert("exp", now - 60);
    let token = token_with(TEST_SECRET, claims, None);

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_numeric_expiry_is_forbidden() {
    let app = TestApp::new().await;

    for exp in [json!("soon"), json!("1000")] {
        let mut claims = AuthClaims::for_subject("tester");
        claims.insert("exp", exp);
        let token = token_with(TEST_SECRET, claims, None);

        let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_tampered_token_is_forbidden() {
    let app = TestApp::new().await;
    let token = valid_token();
    let (head, _signature) = token.rsplit_once('.').unwrap();
    let tampered = format!("{}.{}", head, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");

    let response = app
        .send(upload_request(Some(&tampered), &png_upload_body()))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Valid Tokens
// =============================================================================

#[tokio::test]
async fn test_token_without_expiry_is_accepted() {
    let app = TestApp::new().await;
    let token = token_with(TEST_SECRET, AuthClaims::for_subject("tester"), None);

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_is_accepted() {
    let app = TestApp::new().await;

    let request = Request::post("/upload")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .header(header::AUTHORIZATION, format!("bearer {}", valid_token()))
        .body(Body::from(png_upload_body()))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_arbitrary_claims_are_accepted() {
    let app = TestApp::new().await;
    let claims: AuthClaims =
        serde_json::from_value(json!({"username": "testuser", "role": "editor"})).unwrap();
    let token = token_with(TEST_SECRET, claims, Some(60));

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "File uploaded successfully");
}

#[tokio::test]
async fn test_token_with_audience_is_accepted() {
    let app = TestApp::new().await;
    let mut claims = AuthClaims::for_subject("tester");
    claims.insert("aud", "patient-journal");
    let token = token_with(TEST_SECRET, claims, Some(60));

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

// =============================================================================
// Server Misconfiguration
// =============================================================================

#[tokio::test]
async fn test_missing_secret_is_server_error() {
    let app = TestApp::without_secret().await;
    let token = token_with(TEST_SECRET, AuthClaims::for_subject("tester"), Some(60));

    let response = app.send(upload_request(Some(&token), &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_secret_is_server_error_for_any_token() {
    let app = TestApp::without_secret().await;

    for token in ["not-a-jwt", "invalid.token.here"] {
        let response = app.send(upload_request(Some(token), &png_upload_body())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[tokio::test]
async fn test_missing_secret_still_reports_missing_token_first() {
    let app = TestApp::without_secret().await;

    let response = app.send(upload_request(None, &png_upload_body())).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Public Routes
// =============================================================================

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = TestApp::without_secret().await;
    app.put_file("a.png", &white_png(2, 2));

    let response = app.send(get_request("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");

    let response = app.send(get_request("/images/a.png")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

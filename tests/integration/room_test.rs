//! Room lifecycle over the HTTP surface.

use http::StatusCode;
use serde_json::json;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_create_and_resolve_room() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    assert_eq!(code.len(), 8);

    let response = app
        .request("GET", &format!("/api/rooms/{code}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["code"], code);
    assert_eq!(response.body["owner"], "alice");
    // Credentials never leave the server.
    assert!(response.body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_room_codes_resolve_case_insensitively() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;

    let response = app
        .request("GET", &format!("/api/rooms/{}", code.to_lowercase()), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["code"], code);
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let app = TestApp::new().await;
    let response = app.request("GET", "/api/rooms/ZZZZ9999", None, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_room_code_is_rejected() {
    let app = TestApp::new().await;
    let response = app.request("GET", "/api/rooms/nope", None, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_room_requires_password_at_creation() {
    let app = TestApp::new().await;
    let response = app
        .request(
            "POST",
            "/api/rooms",
            Some(json!({
                "mode": "internet",
                "access": "password",
                "lifespan": "temporary",
            })),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_temporary_room_gets_expiry() {
    let app = TestApp::new().await;
    let response = app
        .request(
            "POST",
            "/api/rooms",
            Some(json!({
                "mode": "local",
                "access": "public",
                "lifespan": "temporary",
            })),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.body["expires_at"].is_string());
}

#[tokio::test]
async fn test_only_the_owner_may_delete() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;

    let response = app
        .request("DELETE", &format!("/api/rooms/{code}"), None, Some("mallory"))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request("DELETE", &format!("/api/rooms/{code}"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    // A soft-deleted room is indistinguishable from a missing one.
    let response = app
        .request("GET", &format!("/api/rooms/{code}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

//! Item CRUD and version history over the HTTP surface.

use http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::helpers::TestApp;

fn text(content: &str) -> serde_json::Value {
    json!({"type": "text", "content": content})
}

#[tokio::test]
async fn test_item_crud_round_trip() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let items_path = format!("/api/rooms/{code}/items");

    let response = app
        .request(
            "POST",
            &items_path,
            Some(json!({"payload": text("hello")})),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["current_version"], 1);
    let item_id = response.body["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            "PUT",
            &format!("/api/items/{item_id}"),
            Some(json!({"payload": text("hello again")})),
            Some("bob"),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["current_version"], 2);

    let response = app.request("GET", &items_path, None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 1);

    let response = app
        .request("DELETE", &format!("/api/items/{item_id}"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = app.request("GET", &items_path, None, None).await;
    assert!(response.body.as_array().unwrap().is_empty());

    // Replayed deletes converge instead of failing.
    let response = app
        .request("DELETE", &format!("/api/items/{item_id}"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_replayed_create_with_client_id_is_idempotent() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let items_path = format!("/api/rooms/{code}/items");
    let item_id = Uuid::new_v4().to_string();
    let body = json!({"item_id": item_id, "payload": text("queued offline")});

    let first = app
        .request("POST", &items_path, Some(body.clone()), Some("alice"))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let replay = app
        .request("POST", &items_path, Some(body), Some("alice"))
        .await;
    assert_eq!(replay.status, StatusCode::CREATED);
    assert_eq!(replay.body["id"], first.body["id"]);

    let response = app.request("GET", &items_path, None, None).await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_version_history_is_newest_first() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;

    let response = app
        .request(
            "POST",
            &format!("/api/rooms/{code}/items"),
            Some(json!({"payload": text("v1")})),
            Some("alice"),
        )
        .await;
    let item_id = response.body["id"].as_str().unwrap().to_string();

    for i in 2..=4 {
        app.request(
            "PUT",
            &format!("/api/items/{item_id}"),
            Some(json!({"payload": text(&format!("v{i}"))})),
            Some("alice"),
        )
        .await;
    }

    let response = app
        .request("GET", &format!("/api/items/{item_id}/versions?limit=3"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let versions: Vec<i64> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_i64().unwrap())
        .collect();
    assert_eq!(versions, vec![4, 3, 2]);
}

#[tokio::test]
async fn test_update_of_unknown_item_is_not_found() {
    let app = TestApp::new().await;
    app.create_room("alice").await;

    let response = app
        .request(
            "PUT",
            &format!("/api/items/{}", Uuid::new_v4()),
            Some(json!({"payload": text("ghost")})),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

//! The upload sub-protocol, end to end over the HTTP surface.

use chrono::{Duration, Utc};
use http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use roomdrop_core::types::id::UploadId;
use roomdrop_database::UploadStore;
use roomdrop_entity::upload::{ChunkRecord, Upload, UploadStatus};

use crate::helpers::TestApp;

fn init_body(code: &str, size: i64, total_chunks: i32) -> serde_json::Value {
    json!({
        "room_code": code,
        "filename": "report.pdf",
        "mime_type": "application/pdf",
        "size": size,
        "total_chunks": total_chunks,
    })
}

#[tokio::test]
async fn test_chunked_upload_to_item() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;

    let response = app
        .request("POST", "/api/uploads/init", Some(init_body(&code, 12, 3)), Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    let upload_id = response.body["upload_id"].as_str().unwrap().to_string();
    let targets = response.body["chunk_upload_targets"].as_array().unwrap();
    assert_eq!(targets.len(), 3);
    assert!(response.body["chunk_size"].as_u64().unwrap() > 0);

    // Ack chunk 1, chunk 1 again, then chunk 2: 67%, uploading.
    let first = app
        .put_bytes(targets[1].as_str().unwrap(), b"bbbb".to_vec())
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let re_ack = app
        .put_bytes(targets[1].as_str().unwrap(), b"bbbb".to_vec())
        .await;
    assert_eq!(re_ack.status, StatusCode::OK);
    assert_eq!(re_ack.body["etag"], first.body["etag"]);
    let response = app
        .put_bytes(targets[2].as_str().unwrap(), b"cccc".to_vec())
        .await;
    assert_eq!(response.body["progress"], 67);
    assert_eq!(response.body["complete"], false);

    let response = app
        .request("GET", &format!("/api/uploads/{upload_id}"), None, None)
        .await;
    assert_eq!(response.body["status"], "uploading");

    // Finalize before completion: retryable conflict, keep uploading.
    let response = app
        .request(
            "POST",
            &format!("/api/uploads/{upload_id}/finalize"),
            None,
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .put_bytes(targets[0].as_str().unwrap(), b"aaaa".to_vec())
        .await;
    assert_eq!(response.body["progress"], 100);
    assert_eq!(response.body["complete"], true);

    let finalized = app
        .request(
            "POST",
            &format!("/api/uploads/{upload_id}/finalize"),
            None,
            Some("alice"),
        )
        .await;
    assert_eq!(finalized.status, StatusCode::OK);
    assert_eq!(finalized.body["payload"]["type"], "file");
    assert_eq!(finalized.body["payload"]["size_bytes"], 12);

    // Finalizing again returns the already-created item, not a duplicate.
    let again = app
        .request(
            "POST",
            &format!("/api/uploads/{upload_id}/finalize"),
            None,
            Some("alice"),
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["id"], finalized.body["id"]);

    let response = app
        .request("GET", &format!("/api/rooms/{code}/items"), None, None)
        .await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_init_validations() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;

    let response = app
        .request("POST", "/api/uploads/init", Some(init_body(&code, 12, 0)), Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // Larger than the room's max file size.
    let oversized = init_body(&code, 2 * 1024 * 1024 * 1024, 1);
    let response = app
        .request("POST", "/api/uploads/init", Some(oversized), Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request(
            "POST",
            "/api/uploads/init",
            Some(init_body("ZZZZ9999", 12, 1)),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_is_terminal() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let response = app
        .request("POST", "/api/uploads/init", Some(init_body(&code, 8, 2)), Some("alice"))
        .await;
    let upload_id = response.body["upload_id"].as_str().unwrap().to_string();

    let response = app
        .request("POST", &format!("/api/uploads/{upload_id}/cancel"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "cancelled");

    // No further chunk acks are accepted.
    let response = app
        .put_bytes(&format!("/api/uploads/{upload_id}/chunks/0"), b"aaaa".to_vec())
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_chunk_index_out_of_range() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let response = app
        .request("POST", "/api/uploads/init", Some(init_body(&code, 8, 2)), Some("alice"))
        .await;
    let upload_id = response.body["upload_id"].as_str().unwrap().to_string();

    let response = app
        .put_bytes(&format!("/api/uploads/{upload_id}/chunks/2"), b"x".to_vec())
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_upload_is_not_found() {
    let app = TestApp::new().await;
    app.create_room("alice").await;

    let response = app
        .put_bytes(&format!("/api/uploads/{}/chunks/0", Uuid::new_v4()), b"x".to_vec())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reaped_upload_acks_as_not_found() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let room = app
        .state
        .rooms
        .resolve(&code.parse().unwrap())
        .await
        .unwrap();

    // An upload already past its expiry, as the reaper would find it.
    let upload = Upload {
        id: UploadId::new(),
        room_id: room.id,
        uploaded_by: Some("alice".to_string()),
        filename: "stale.bin".to_string(),
        mime_type: "application/octet-stream".to_string(),
        total_size: 8,
        storage_key: format!("uploads/{}", Uuid::new_v4()),
        external_transfer_id: None,
        encrypted: false,
        iv: None,
        chunks: (0..2).map(ChunkRecord::empty).collect(),
        total_chunks: 2,
        status: UploadStatus::Pending,
        item_id: None,
        expires_at: Utc::now() - Duration::seconds(1),
        created_at: Utc::now() - Duration::hours(25),
    };
    app.state.stores.uploads().create(&upload).await.unwrap();

    let removed = app.state.uploads.expire_stale(Utc::now()).await.unwrap();
    assert_eq!(removed, 1);

    let response = app
        .put_bytes(&format!("/api/uploads/{}/chunks/0", upload.id), b"aa".to_vec())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

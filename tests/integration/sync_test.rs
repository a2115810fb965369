//! The reconciliation client against a real server socket.

use std::sync::Arc;

use http::StatusCode;

use roomdrop_client::op::Operation;
use roomdrop_client::remote::HttpRemoteApi;
use roomdrop_client::store::ClientStore;
use roomdrop_client::sync::SyncEngine;
use roomdrop_core::config::sync::SyncConfig;
use roomdrop_core::types::id::ItemId;
use roomdrop_entity::item::ItemPayload;

use crate::helpers::TestApp;

fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        max_retries: 2,
        backoff_base_ms: 1,
        backoff_max_ms: 4,
        request_timeout_seconds: 5,
    }
}

async fn client_engine(app: &TestApp, peer: &str) -> (Arc<SyncEngine>, tempfile::TempDir) {
    let addr = app.spawn_server().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ClientStore::open_at(&dir.path().join("client.db")).expect("store"));
    let remote = Arc::new(
        HttpRemoteApi::new(format!("http://{addr}"), Some(peer), &fast_sync_config())
            .expect("remote"),
    );
    (SyncEngine::new(store, remote, fast_sync_config()), dir)
}

fn text(content: &str) -> ItemPayload {
    ItemPayload::Text {
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_offline_queue_drains_against_live_server() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let (engine, _dir) = client_engine(&app, "alice").await;

    // Staged offline: create, update, then delete the same item.
    let item_id = ItemId::new();
    engine
        .enqueue(Operation::CreateItem {
            room_code: code.clone(),
            item_id,
            payload: text("offline v1"),
            parent_id: None,
        })
        .unwrap();
    engine
        .enqueue(Operation::UpdateItem {
            room_code: code.clone(),
            item_id,
            payload: text("offline v2"),
        })
        .unwrap();
    engine
        .enqueue(Operation::DeleteItem {
            room_code: code.clone(),
            item_id,
        })
        .unwrap();

    let summary = engine.sync_now().await.unwrap();
    assert_eq!(summary.synced, 3);
    assert_eq!(summary.failed, 0);

    // The update never resurrected the item: it stays deleted server-side.
    let response = app
        .request("GET", &format!("/api/rooms/{code}/items"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.as_array().unwrap().is_empty());
    assert_eq!(engine.store().queue_len().unwrap(), 0);
}

#[tokio::test]
async fn test_server_conflict_parks_operation() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let (engine, _dir) = client_engine(&app, "alice").await;

    // Updating an item the server never saw is a terminal NotFound.
    engine
        .enqueue(Operation::UpdateItem {
            room_code: code,
            item_id: ItemId::new(),
            payload: text("ghost"),
        })
        .unwrap();

    let summary = engine.sync_now().await.unwrap();
    assert_eq!(summary.failed, 1);
    let failed = engine.failed_operations().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].retry_count, 0);
}

#[tokio::test]
async fn test_offline_chunk_ops_complete_an_upload() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let (engine, _dir) = client_engine(&app, "alice").await;

    let response = app
        .request(
            "POST",
            "/api/uploads/init",
            Some(serde_json::json!({
                "room_code": code,
                "filename": "queued.bin",
                "mime_type": "application/octet-stream",
                "size": 8,
                "total_chunks": 2,
            })),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let upload_id = response.body["upload_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    for index in 0..2 {
        engine
            .enqueue(Operation::UploadChunk {
                room_code: code.clone(),
                upload_id,
                index,
                data: vec![index as u8; 4],
            })
            .unwrap();
    }
    let summary = engine.sync_now().await.unwrap();
    assert_eq!(summary.synced, 2);

    let response = app
        .request("GET", &format!("/api/uploads/{upload_id}"), None, None)
        .await;
    assert_eq!(response.body["complete"], true);
    assert_eq!(response.body["progress"], 100);
}

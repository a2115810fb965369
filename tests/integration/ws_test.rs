//! WebSocket presence and broadcast over a real socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::helpers::TestApp;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: std::net::SocketAddr, code: &str, peer: &str) -> WsClient {
    let url = format!("ws://{addr}/ws?room={code}&peer={peer}&name={peer}");
    let (stream, _) = connect_async(&url).await.expect("ws connect");
    stream
}

/// Next text frame as JSON, within a deadline.
async fn next_event(client: &mut WsClient) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let message = client
                .next()
                .await
                .expect("stream ended")
                .expect("ws error");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).expect("event json");
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn send_event(client: &mut WsClient, event: Value) {
    client
        .send(Message::Text(event.to_string().into()))
        .await
        .expect("ws send");
}

#[tokio::test]
async fn test_join_receives_consistent_presence_snapshot() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, &code, "alice").await;
    let snapshot = next_event(&mut alice).await;
    assert_eq!(snapshot["type"], "room:peers");
    assert_eq!(snapshot["peers"].as_array().unwrap().len(), 1);

    let mut bob = connect(addr, &code, "bob").await;
    let snapshot = next_event(&mut bob).await;
    assert_eq!(snapshot["type"], "room:peers");
    let peers: Vec<&str> = snapshot["peers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["peer_id"].as_str().unwrap())
        .collect();
    // Not missing any peer already present at subscribe time.
    assert_eq!(peers, vec!["alice", "bob"]);

    // The rest of the room hears about the join.
    let joined = next_event(&mut alice).await;
    assert_eq!(joined["type"], "room:peer-joined");
    assert_eq!(joined["peer_id"], "bob");
}

#[tokio::test]
async fn test_item_events_fan_out_to_the_room() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, &code, "alice").await;
    next_event(&mut alice).await; // own snapshot
    let mut bob = connect(addr, &code, "bob").await;
    next_event(&mut bob).await; // own snapshot
    next_event(&mut alice).await; // bob joined

    send_event(
        &mut alice,
        json!({"type": "item:create", "payload": {"type": "text", "content": "hi"}}),
    )
    .await;

    // Both the sender and the rest of the room observe the creation.
    let to_bob = next_event(&mut bob).await;
    assert_eq!(to_bob["type"], "item:created");
    assert_eq!(to_bob["item"]["payload"]["content"], "hi");
    let to_alice = next_event(&mut alice).await;
    assert_eq!(to_alice["type"], "item:created");
    assert_eq!(to_alice["item"]["id"], to_bob["item"]["id"]);
}

#[tokio::test]
async fn test_signal_relay_reaches_only_the_target() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, &code, "alice").await;
    next_event(&mut alice).await;
    let mut bob = connect(addr, &code, "bob").await;
    next_event(&mut bob).await;
    next_event(&mut alice).await;
    let mut carol = connect(addr, &code, "carol").await;
    next_event(&mut carol).await;
    next_event(&mut alice).await;
    next_event(&mut bob).await;

    send_event(
        &mut bob,
        json!({
            "type": "signal:relay",
            "payload": {"sdp": "offer"},
            "target_peer_id": "alice",
        }),
    )
    .await;

    let relayed = next_event(&mut alice).await;
    assert_eq!(relayed["type"], "signal:relay");
    assert_eq!(relayed["from_peer_id"], "bob");
    // The payload is opaque to the engine.
    assert_eq!(relayed["payload"]["sdp"], "offer");

    // Carol sees nothing; a ping answers before any stray relay would.
    send_event(&mut carol, json!({"type": "ping"})).await;
    let next = next_event(&mut carol).await;
    assert_eq!(next["type"], "pong");
}

#[tokio::test]
async fn test_disconnect_fires_peer_left() {
    let app = TestApp::new().await;
    let code = app.create_room("alice").await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, &code, "alice").await;
    next_event(&mut alice).await;
    let mut bob = connect(addr, &code, "bob").await;
    next_event(&mut bob).await;
    next_event(&mut alice).await;

    bob.close(None).await.expect("close");

    let left = next_event(&mut alice).await;
    assert_eq!(left["type"], "room:peer-left");
    assert_eq!(left["peer_id"], "bob");
}

#[tokio::test]
async fn test_ws_upgrade_enforces_room_password() {
    let app = TestApp::new().await;
    let response = app
        .request(
            "POST",
            "/api/rooms",
            Some(json!({
                "mode": "internet",
                "access": "password",
                "lifespan": "persistent",
                "password": "hunter2",
            })),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let code = response.body["code"].as_str().unwrap().to_string();
    let addr = app.spawn_server().await;

    let url = format!("ws://{addr}/ws?room={code}&peer=bob");
    let err = connect_async(&url).await.expect_err("should be rejected");
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 403);
        }
        other => panic!("unexpected error: {other}"),
    }

    let url = format!("ws://{addr}/ws?room={code}&peer=bob&password=hunter2");
    let (mut stream, _) = connect_async(&url).await.expect("ws connect");
    let snapshot = next_event(&mut stream).await;
    assert_eq!(snapshot["type"], "room:peers");
}

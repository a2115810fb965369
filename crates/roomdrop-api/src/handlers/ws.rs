//! Per-room WebSocket handler.
//!
//! `GET /ws?room={code}&peer={peerId}&name={display}` upgrades into the
//! room's event stream. The join is implicit at upgrade: the connection is
//! subscribed, its peer announced, and the presence snapshot sent as the
//! first outbound event, atomically with respect to other joins.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use roomdrop_core::AppError;
use roomdrop_entity::room::RoomCode;
use roomdrop_realtime::connection::handle::ConnectionHandle;
use roomdrop_realtime::message::types::{ClientEvent, ServerEvent};
use roomdrop_service::context::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters of the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Room code to join.
    pub room: String,
    /// Peer identity from the external auth layer.
    pub peer: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Room password, when the room requires one.
    pub password: Option<String>,
}

/// `GET /ws` — upgrade into a room's event stream.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if query.peer.trim().is_empty() {
        return Err(AppError::validation("A peer identity is required").into());
    }
    // Resolve and gate before the upgrade so rejections carry HTTP statuses.
    let code = RoomCode::parse(&query.room)?;
    let room = state.rooms.resolve(&code).await?;
    state.rooms.verify_password(&room, query.password.as_deref())?;

    let room_code = room.code.as_str().to_string();
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(state, socket, room_code, query.peer, query.name)
    }))
}

async fn handle_socket(
    state: AppState,
    socket: WebSocket,
    room_code: String,
    peer_id: String,
    display_name: Option<String>,
) {
    let (handle, mut outbound) = state.realtime.register(peer_id, display_name);

    // Subscribe-with-snapshot: the caller observes no gap between the
    // snapshot and subsequently published events.
    let snapshot = state.realtime.rooms.join(&room_code, handle.clone());
    handle.send(ServerEvent::Peers { peers: snapshot });

    info!(conn_id = %handle.id, peer = %handle.peer_id, room = %room_code, "WebSocket established");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let outbound_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => handle_event(&state, &handle, &room_code, event).await,
                Err(e) => {
                    handle.send(ServerEvent::Error {
                        code: "VALIDATION".to_string(),
                        message: format!("Unrecognized event: {e}"),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id = %handle.id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    outbound_task.abort();
    state.realtime.unregister(&handle.id);
    info!(conn_id = %handle.id, peer = %handle.peer_id, room = %room_code, "WebSocket closed");
}

/// Dispatch one inbound event. Service failures turn into `error` events
/// on this connection; they never tear the socket down.
async fn handle_event(
    state: &AppState,
    handle: &Arc<ConnectionHandle>,
    room_code: &str,
    event: ClientEvent,
) {
    let outcome = match event {
        ClientEvent::Ping => {
            handle.send(ServerEvent::Pong);
            Ok(())
        }
        ClientEvent::RoomJoin {
            room_code: requested,
            ..
        } => {
            // Re-announce after a reconnect; the connection stays bound to
            // the room it upgraded into.
            if requested.eq_ignore_ascii_case(room_code) {
                let snapshot = state.realtime.rooms.join(room_code, handle.clone());
                handle.send(ServerEvent::Peers { peers: snapshot });
                Ok(())
            } else {
                Err(AppError::validation(
                    "This connection is bound to a different room",
                ))
            }
        }
        ClientEvent::RoomLeave => {
            state.realtime.rooms.leave(room_code, handle.id);
            Ok(())
        }
        ClientEvent::SignalRelay {
            payload,
            target_peer_id,
        } => {
            state
                .realtime
                .rooms
                .relay(room_code, handle, target_peer_id.as_deref(), payload);
            Ok(())
        }
        ClientEvent::ItemCreate {
            item_id,
            payload,
            parent_id,
        } => {
            create_item(state, handle, room_code, item_id, payload, parent_id).await
        }
        ClientEvent::ItemUpdate { item_id, payload } => {
            update_item(state, handle, room_code, item_id, payload).await
        }
        ClientEvent::ItemDelete { item_id } => delete_item(state, room_code, item_id).await,
    };

    if let Err(e) = outcome {
        handle.send(ServerEvent::Error {
            code: e.kind.to_string(),
            message: e.message,
        });
    }
}

fn context_of(handle: &ConnectionHandle) -> RequestContext {
    RequestContext {
        peer_id: Some(handle.peer_id.clone()),
        display_name: handle.display_name.clone(),
    }
}

async fn create_item(
    state: &AppState,
    handle: &ConnectionHandle,
    room_code: &str,
    item_id: Option<roomdrop_core::types::id::ItemId>,
    payload: roomdrop_entity::item::ItemPayload,
    parent_id: Option<roomdrop_core::types::id::ItemId>,
) -> Result<(), AppError> {
    let code = RoomCode::parse(room_code)?;
    let room = state.rooms.resolve(&code).await?;
    let item = state
        .items
        .create_item(&context_of(handle), &room, item_id, payload, parent_id)
        .await?;
    state.rooms.touch(room.id).await?;
    state
        .realtime
        .rooms
        .publish(room_code, ServerEvent::ItemCreated { item });
    Ok(())
}

async fn update_item(
    state: &AppState,
    handle: &ConnectionHandle,
    room_code: &str,
    item_id: roomdrop_core::types::id::ItemId,
    payload: roomdrop_entity::item::ItemPayload,
) -> Result<(), AppError> {
    let code = RoomCode::parse(room_code)?;
    let room = state.rooms.resolve(&code).await?;
    let item = state
        .items
        .update_item(&context_of(handle), &room, item_id, payload)
        .await?;
    state.rooms.touch(room.id).await?;
    state
        .realtime
        .rooms
        .publish(room_code, ServerEvent::ItemUpdated { item });
    Ok(())
}

async fn delete_item(
    state: &AppState,
    room_code: &str,
    item_id: roomdrop_core::types::id::ItemId,
) -> Result<(), AppError> {
    let code = RoomCode::parse(room_code)?;
    let room = state.rooms.resolve(&code).await?;
    if state.items.delete_item(&room, item_id).await? {
        state.rooms.touch(room.id).await?;
        state
            .realtime
            .rooms
            .publish(room_code, ServerEvent::ItemDeleted { item_id });
    }
    Ok(())
}

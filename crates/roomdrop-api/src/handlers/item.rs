//! Item endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use validator::Validate;

use roomdrop_core::AppError;
use roomdrop_core::types::id::ItemId;
use roomdrop_database::{ItemStore, RoomStore};
use roomdrop_entity::item::Item;
use roomdrop_entity::room::{Room, RoomCode};
use roomdrop_entity::version::Version;
use roomdrop_realtime::message::types::ServerEvent;

use crate::dto::request::{CreateItemRequest, UpdateItemRequest, VersionHistoryQuery};
use crate::error::ApiError;
use crate::extractors::Identity;
use crate::state::AppState;

/// `GET /api/rooms/{code}/items`
pub async fn list_items(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let code = RoomCode::parse(&code)?;
    let room = state.rooms.resolve(&code).await?;
    Ok(Json(state.items.list_items(&room).await?))
}

/// `POST /api/rooms/{code}/items`
pub async fn create_item(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Path(code): Path<String>,
    Json(body): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    body.validate()?;
    let code = RoomCode::parse(&code)?;
    let room = state.rooms.resolve(&code).await?;

    let item = state
        .items
        .create_item(&ctx, &room, body.item_id, body.payload, body.parent_id)
        .await?;
    state.rooms.touch(room.id).await?;
    state.realtime.rooms.publish(
        room.code.as_str(),
        ServerEvent::ItemCreated { item: item.clone() },
    );
    Ok((StatusCode::CREATED, Json(item)))
}

/// `PUT /api/items/{id}`
pub async fn update_item(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Path(item_id): Path<ItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<Item>, ApiError> {
    body.validate()?;
    let room = room_of_item(&state, item_id).await?;

    let item = state
        .items
        .update_item(&ctx, &room, item_id, body.payload)
        .await?;
    state.rooms.touch(room.id).await?;
    state.realtime.rooms.publish(
        room.code.as_str(),
        ServerEvent::ItemUpdated { item: item.clone() },
    );
    Ok(Json(item))
}

/// `DELETE /api/items/{id}`
///
/// Deleting an already-deleted item succeeds, so offline replays converge.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<StatusCode, ApiError> {
    let room = match room_of_item(&state, item_id).await {
        Ok(room) => room,
        // The item is already gone; the replayed delete has nothing to do.
        Err(ApiError(e)) if e.kind == roomdrop_core::error::ErrorKind::NotFound => {
            return Ok(StatusCode::NO_CONTENT);
        }
        Err(e) => return Err(e),
    };

    if state.items.delete_item(&room, item_id).await? {
        state.rooms.touch(room.id).await?;
        state
            .realtime
            .rooms
            .publish(room.code.as_str(), ServerEvent::ItemDeleted { item_id });
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/items/{id}/versions`
pub async fn list_versions(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    Query(query): Query<VersionHistoryQuery>,
) -> Result<Json<Vec<Version>>, ApiError> {
    query.validate()?;
    room_of_item(&state, item_id).await?;
    let history = state.items.versions().history(item_id, query.limit).await?;
    Ok(Json(history))
}

/// Resolve the accessible room an item belongs to.
async fn room_of_item(state: &AppState, item_id: ItemId) -> Result<Room, ApiError> {
    let item = state
        .stores
        .items()
        .find_by_id(item_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Item {item_id} not found")))?;
    let room = state
        .stores
        .rooms()
        .find_by_id(item.room_id)
        .await?
        .filter(|r| r.deleted_at.is_none())
        .ok_or_else(|| AppError::not_found(format!("Item {item_id} not found")))?;
    if !room.is_accessible(Utc::now()) {
        return Err(AppError::expired(format!("Room {} has expired", room.code)).into());
    }
    Ok(room)
}

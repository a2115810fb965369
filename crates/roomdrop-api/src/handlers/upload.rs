//! Upload sub-protocol endpoints (request/response, not event-bus).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bytes::Bytes;
use validator::Validate;

use roomdrop_core::types::id::UploadId;
use roomdrop_database::RoomStore;
use roomdrop_entity::item::Item;
use roomdrop_entity::room::RoomCode;
use roomdrop_realtime::message::types::ServerEvent;
use roomdrop_service::upload::InitUploadParams;

use crate::dto::request::InitUploadRequest;
use crate::dto::response::{ChunkAckResponse, InitUploadResponse, UploadStatusResponse};
use crate::error::ApiError;
use crate::extractors::Identity;
use crate::state::AppState;

/// `POST /api/uploads/init`
pub async fn init_upload(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Json(body): Json<InitUploadRequest>,
) -> Result<(StatusCode, Json<InitUploadResponse>), ApiError> {
    body.validate()?;
    let code = RoomCode::parse(&body.room_code)?;
    let room = state.rooms.resolve(&code).await?;

    let upload = state
        .uploads
        .init_upload(
            &ctx,
            &room,
            InitUploadParams {
                filename: body.filename,
                mime_type: body.mime_type,
                total_size: body.size,
                total_chunks: body.total_chunks,
                encrypted: body.encrypted,
                iv: body.iv,
                external_transfer_id: body.external_transfer_id,
            },
        )
        .await?;

    let chunk_upload_targets = (0..upload.total_chunks)
        .map(|index| format!("/api/uploads/{}/chunks/{index}", upload.id))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            upload_id: upload.id,
            chunk_size: state.uploads.chunk_size(),
            total_chunks: upload.total_chunks,
            chunk_upload_targets,
            expires_at: upload.expires_at,
        }),
    ))
}

/// `PUT /api/uploads/{id}/chunks/{index}` — raw chunk body.
pub async fn put_chunk(
    State(state): State<AppState>,
    Path((upload_id, index)): Path<(UploadId, i32)>,
    body: Bytes,
) -> Result<Json<ChunkAckResponse>, ApiError> {
    let (upload, etag) = state.uploads.store_chunk(upload_id, index, body).await?;
    Ok(Json(ChunkAckResponse {
        index,
        etag,
        progress: upload.progress(),
        complete: upload.is_complete(),
    }))
}

/// `GET /api/uploads/{id}`
pub async fn get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<UploadId>,
) -> Result<Json<UploadStatusResponse>, ApiError> {
    let upload = state.uploads.get(upload_id).await?;
    Ok(Json(upload.into()))
}

/// `POST /api/uploads/{id}/finalize`
pub async fn finalize_upload(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Path(upload_id): Path<UploadId>,
) -> Result<Json<Item>, ApiError> {
    let item = state.uploads.finalize(&ctx, upload_id).await?;

    if let Some(room) = state.stores.rooms().find_by_id(item.room_id).await? {
        state.rooms.touch(room.id).await?;
        state.realtime.rooms.publish(
            room.code.as_str(),
            ServerEvent::ItemCreated { item: item.clone() },
        );
    }
    Ok(Json(item))
}

/// `POST /api/uploads/{id}/cancel`
pub async fn cancel_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<UploadId>,
) -> Result<Json<UploadStatusResponse>, ApiError> {
    let upload = state.uploads.cancel(upload_id).await?;
    Ok(Json(upload.into()))
}

//! Room endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use validator::Validate;

use roomdrop_entity::room::RoomCode;
use roomdrop_service::room::service::CreateRoomParams;

use crate::dto::request::CreateRoomRequest;
use crate::dto::response::RoomResponse;
use crate::error::ApiError;
use crate::extractors::Identity;
use crate::state::AppState;

/// `POST /api/rooms`
pub async fn create_room(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    body.validate()?;
    let room = state
        .rooms
        .create_room(
            &ctx,
            CreateRoomParams {
                mode: body.mode,
                access: body.access,
                lifespan: body.lifespan,
                password: body.password,
                settings: body.settings,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// `GET /api/rooms/{code}`
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let code = RoomCode::parse(&code)?;
    let room = state.rooms.resolve(&code).await?;
    Ok(Json(room.into()))
}

/// `DELETE /api/rooms/{code}`
pub async fn delete_room(
    State(state): State<AppState>,
    Identity(ctx): Identity,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    let code = RoomCode::parse(&code)?;
    let room = state.rooms.resolve(&code).await?;
    state.rooms.delete_room(&ctx, &room).await?;
    Ok(StatusCode::NO_CONTENT)
}

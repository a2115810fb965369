//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::dto::response::HealthResponse;
use crate::state::AppState;

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = state.storage.health_check().await.unwrap_or(false);
    Json(HealthResponse {
        status: if storage { "ok" } else { "degraded" }.to_string(),
        storage,
    })
}

//! Route definitions.
//!
//! HTTP routes mount under `/api`; the WebSocket upgrade lives at `/ws`.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Chunk bodies are the largest requests; leave headroom over the
    // configured chunk size.
    let body_limit = (state.config.storage.chunk_size_bytes as usize).saturating_mul(2);

    let api_routes = Router::new()
        .merge(room_routes())
        .merge(item_routes())
        .merge(upload_routes())
        .route("/health", get(handlers::health::health));

    let cors = build_cors_layer(&state);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// Room lifecycle.
fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(handlers::room::create_room))
        .route("/rooms/{code}", get(handlers::room::get_room))
        .route("/rooms/{code}", delete(handlers::room::delete_room))
}

/// Item CRUD and version history.
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms/{code}/items", get(handlers::item::list_items))
        .route("/rooms/{code}/items", post(handlers::item::create_item))
        .route("/items/{id}", put(handlers::item::update_item))
        .route("/items/{id}", delete(handlers::item::delete_item))
        .route("/items/{id}/versions", get(handlers::item::list_versions))
}

/// The upload sub-protocol.
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads/init", post(handlers::upload::init_upload))
        .route(
            "/uploads/{id}/chunks/{index}",
            put(handlers::upload::put_chunk),
        )
        .route("/uploads/{id}", get(handlers::upload::get_upload))
        .route(
            "/uploads/{id}/finalize",
            post(handlers::upload::finalize_upload),
        )
        .route("/uploads/{id}/cancel", post(handlers::upload::cancel_upload))
}

fn build_cors_layer(state: &AppState) -> CorsLayer {
    let config = &state.config.server.cors;
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.max_age_seconds));

    if config.allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

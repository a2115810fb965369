//! Server endpoints the drain worker replays against.
//!
//! The trait seam keeps the sync engine testable without a network; the
//! HTTP implementation classifies transport and status failures into the
//! application taxonomy before they reach the queue, so retry decisions
//! are made on `ErrorKind` alone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use roomdrop_core::config::sync::SyncConfig;
use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, UploadId};
use roomdrop_entity::item::{Item, ItemPayload};

/// Acknowledgment returned for one stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAck {
    /// Acknowledged chunk index.
    pub index: i32,
    /// Entity tag of the stored bytes.
    pub etag: String,
    /// Upload progress after this ack, 0–100.
    pub progress: u8,
    /// Whether every chunk is now acknowledged.
    pub complete: bool,
}

/// The server operations a drain can invoke.
#[async_trait]
pub trait RemoteApi: Send + Sync + std::fmt::Debug + 'static {
    /// Create an item; replays are idempotent through the client-generated id.
    async fn create_item(
        &self,
        room_code: &str,
        item_id: ItemId,
        payload: &ItemPayload,
        parent_id: Option<ItemId>,
    ) -> AppResult<Item>;

    /// Replace an item's content (last-writer-wins).
    async fn update_item(&self, item_id: ItemId, payload: &ItemPayload) -> AppResult<Item>;

    /// Delete an item. Deleting an already-deleted item succeeds.
    async fn delete_item(&self, item_id: ItemId) -> AppResult<()>;

    /// Store one chunk of an upload.
    async fn upload_chunk(
        &self,
        upload_id: UploadId,
        index: i32,
        data: Vec<u8>,
    ) -> AppResult<ChunkAck>;
}

#[derive(Debug, Serialize)]
struct CreateItemBody<'a> {
    item_id: ItemId,
    payload: &'a ItemPayload,
    parent_id: Option<ItemId>,
}

#[derive(Debug, Serialize)]
struct UpdateItemBody<'a> {
    payload: &'a ItemPayload,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[allow(dead_code)]
    error: String,
    message: String,
}

/// reqwest-backed [`RemoteApi`] with bounded per-request timeouts.
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteApi {
    /// Build a client for the given server.
    ///
    /// The request timeout comes from [`SyncConfig`]; a timeout surfaces as
    /// `Transient`, which routes it to the retry path, not the conflict
    /// path.
    pub fn new(
        base_url: impl Into<String>,
        peer_id: Option<&str>,
        config: &SyncConfig,
    ) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(peer_id) = peer_id {
            let value = HeaderValue::from_str(peer_id)
                .map_err(|_| AppError::validation("Peer id is not a valid header value"))?;
            headers.insert("x-peer-id", value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Serialization,
                    "Failed to decode server response",
                    e,
                )
            });
        }
        Err(error_from_status(status, response).await)
    }

    async fn expect_success(response: reqwest::Response) -> AppResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(error_from_status(status, response).await)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create_item(
        &self,
        room_code: &str,
        item_id: ItemId,
        payload: &ItemPayload,
        parent_id: Option<ItemId>,
    ) -> AppResult<Item> {
        let response = self
            .client
            .post(self.url(&format!("/api/rooms/{room_code}/items")))
            .json(&CreateItemBody {
                item_id,
                payload,
                parent_id,
            })
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode(response).await
    }

    async fn update_item(&self, item_id: ItemId, payload: &ItemPayload) -> AppResult<Item> {
        let response = self
            .client
            .put(self.url(&format!("/api/items/{item_id}")))
            .json(&UpdateItemBody { payload })
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode(response).await
    }

    async fn delete_item(&self, item_id: ItemId) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/api/items/{item_id}")))
            .send()
            .await
            .map_err(transport_err)?;
        Self::expect_success(response).await
    }

    async fn upload_chunk(
        &self,
        upload_id: UploadId,
        index: i32,
        data: Vec<u8>,
    ) -> AppResult<ChunkAck> {
        let response = self
            .client
            .put(self.url(&format!("/api/uploads/{upload_id}/chunks/{index}")))
            .body(data)
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode(response).await
    }
}

/// Classify an HTTP status into the application taxonomy.
///
/// Anything unrecognized defaults to `Transient`: the replayed operations
/// are idempotent, so failing toward retry is safe.
fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST => ErrorKind::Validation,
        StatusCode::FORBIDDEN => ErrorKind::Forbidden,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::GONE => ErrorKind::Expired,
        _ => ErrorKind::Transient,
    }
}

async fn error_from_status(status: StatusCode, response: reqwest::Response) -> AppError {
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => format!("Server returned {status}"),
    };
    AppError::new(classify_status(status), message)
}

/// Network-level failures (refused connections, timeouts) are transient.
fn transport_err(e: reqwest::Error) -> AppError {
    AppError::with_source(ErrorKind::Transient, format!("Request failed: {e}"), e)
}

//! Shared test helpers: an in-memory application and request plumbing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use roomdrop_api::{AppState, build_router};
use roomdrop_core::config::AppConfig;
use roomdrop_core::traits::storage::StorageProvider;
use roomdrop_database::StoreManager;
use roomdrop_storage::LocalStorageProvider;

/// Test application over the in-memory backend and a temp storage root.
pub struct TestApp {
    /// Router for oneshot requests.
    pub router: Router,
    /// The underlying state, for direct service access in scenarios the
    /// HTTP surface does not expose (e.g. invoking the reaper).
    pub state: AppState,
    _storage_dir: tempfile::TempDir,
}

/// Status and parsed JSON body of one response.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let storage_dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.storage.root_path = storage_dir
            .path()
            .join("storage")
            .to_str()
            .expect("utf8 path")
            .to_string();

        let config = Arc::new(config);
        let stores = StoreManager::memory();
        let storage: Arc<dyn StorageProvider> = Arc::new(
            LocalStorageProvider::new(&config.storage.root_path)
                .await
                .expect("storage root"),
        );
        let state = AppState::new(config, stores, storage);

        Self {
            router: build_router(state.clone()),
            state,
            _storage_dir: storage_dir,
        }
    }

    /// Issue one JSON request. `peer` populates the `x-peer-id` header.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        peer: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(peer) = peer {
            builder = builder.header("x-peer-id", peer);
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        into_test_response(response).await
    }

    /// PUT a raw byte body (chunk uploads).
    pub async fn put_bytes(&self, path: &str, bytes: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("PUT")
            .uri(path)
            .header("content-type", "application/octet-stream")
            .body(Body::from(bytes))
            .expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        into_test_response(response).await
    }

    /// Create a public persistent room, returning its code.
    pub async fn create_room(&self, owner: &str) -> String {
        let response = self
            .request(
                "POST",
                "/api/rooms",
                Some(serde_json::json!({
                    "mode": "internet",
                    "access": "public",
                    "lifespan": "persistent",
                })),
                Some(owner),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["code"].as_str().expect("room code").to_string()
    }

    /// Bind the app on an ephemeral port for clients that need a real
    /// socket (WebSocket, the reconciliation client).
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        addr
    }
}

async fn into_test_response(response: axum::response::Response) -> TestResponse {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, body }
}

//! Upload service — resumable chunked transfers over the chunk ledger.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use roomdrop_core::config::storage::StorageConfig;
use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::traits::storage::StorageProvider;
use roomdrop_core::types::id::UploadId;
use roomdrop_database::store::{RoomStore, UploadStore};
use roomdrop_entity::item::{Item, ItemPayload};
use roomdrop_entity::room::Room;
use roomdrop_entity::upload::{ChunkRecord, Upload, UploadStatus};

use crate::context::RequestContext;
use crate::item::service::ItemService;

/// Parameters for initiating a chunked upload.
#[derive(Debug, Clone)]
pub struct InitUploadParams {
    /// Intended file name.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// Declared total size in bytes.
    pub total_size: i64,
    /// Number of chunks the client will send.
    pub total_chunks: i32,
    /// Whether the content is encrypted client-side.
    pub encrypted: bool,
    /// Base64 initialization vector for encrypted content.
    pub iv: Option<String>,
    /// Identifier of an external multi-part transfer backing this upload.
    pub external_transfer_id: Option<String>,
}

/// Drives the chunk ledger from initiation to item materialization.
///
/// All check-and-set decisions (chunk-ack idempotence, the single winner of
/// a finalize race) live in the store layer; this service validates input,
/// moves bytes, and turns a complete ledger into an item.
#[derive(Clone)]
pub struct UploadService {
    uploads: Arc<dyn UploadStore>,
    rooms: Arc<dyn RoomStore>,
    items: ItemService,
    storage: Arc<dyn StorageProvider>,
    config: StorageConfig,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService").finish()
    }
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        uploads: Arc<dyn UploadStore>,
        rooms: Arc<dyn RoomStore>,
        items: ItemService,
        storage: Arc<dyn StorageProvider>,
        config: StorageConfig,
    ) -> Self {
        Self {
            uploads,
            rooms,
            items,
            storage,
            config,
        }
    }

    /// Configured chunk size clients should slice at.
    pub fn chunk_size(&self) -> u64 {
        self.config.chunk_size_bytes
    }

    /// Initiates a chunked upload into a room.
    ///
    /// Creates a `Pending` ledger with `total_chunks` unfilled slots and a
    /// hard expiry of now + the configured TTL.
    pub async fn init_upload(
        &self,
        ctx: &RequestContext,
        room: &Room,
        params: InitUploadParams,
    ) -> AppResult<Upload> {
        if params.filename.trim().is_empty() {
            return Err(AppError::validation("Filename must not be empty"));
        }
        if params.total_chunks <= 0 {
            return Err(AppError::validation(format!(
                "Total chunks must be positive, got {}",
                params.total_chunks
            )));
        }
        if params.total_size <= 0 {
            return Err(AppError::validation(format!(
                "File size must be positive, got {}",
                params.total_size
            )));
        }
        if params.total_size as u64 > room.settings.max_file_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds the room limit of {} bytes",
                room.settings.max_file_size_bytes
            )));
        }
        if !room.settings.allows_mime_type(&params.mime_type) {
            return Err(AppError::validation(format!(
                "MIME type '{}' is not allowed in room {}",
                params.mime_type, room.code
            )));
        }
        if params.encrypted {
            let Some(iv) = &params.iv else {
                return Err(AppError::validation(
                    "Encrypted uploads require an initialization vector",
                ));
            };
            if BASE64.decode(iv).is_err() {
                return Err(AppError::validation(
                    "Initialization vector is not valid base64",
                ));
            }
        }

        let id = UploadId::new();
        let now = Utc::now();
        let upload = Upload {
            id,
            room_id: room.id,
            uploaded_by: ctx.peer_id.clone(),
            filename: params.filename,
            mime_type: params.mime_type,
            total_size: params.total_size,
            storage_key: format!("uploads/{id}"),
            external_transfer_id: params.external_transfer_id,
            encrypted: params.encrypted,
            iv: params.iv,
            chunks: (0..params.total_chunks).map(ChunkRecord::empty).collect(),
            total_chunks: params.total_chunks,
            status: UploadStatus::Pending,
            item_id: None,
            expires_at: now + Duration::hours(self.config.upload_ttl_hours as i64),
            created_at: now,
        };

        let created = self.uploads.create(&upload).await?;
        info!(
            room = %room.code,
            upload_id = %created.id,
            chunks = created.total_chunks,
            size = created.total_size,
            "Upload initiated"
        );
        Ok(created)
    }

    /// Writes one chunk's bytes and acknowledges the slot.
    ///
    /// Re-sending an already-acknowledged chunk rewrites the bytes but
    /// leaves the ledger unchanged (the first etag wins). Returns the
    /// ledger after the ack together with the etag of the written bytes.
    pub async fn store_chunk(
        &self,
        upload_id: UploadId,
        index: i32,
        data: Bytes,
    ) -> AppResult<(Upload, String)> {
        let upload = self.get(upload_id).await?;
        if index < 0 || index >= upload.total_chunks {
            return Err(AppError::validation(format!(
                "Chunk index {index} out of range (total: {})",
                upload.total_chunks
            )));
        }

        let path = chunk_path(&upload.storage_key, index);
        let etag = self.storage.write(&path, data).await?;

        // The store call is the authoritative check-and-set; a concurrent
        // cancel or expiry between the write above and this point loses the
        // bytes, not the invariant.
        match self
            .uploads
            .mark_chunk(upload_id, index, Some(etag.clone()), Utc::now())
            .await
        {
            Ok(upload) => {
                info!(
                    upload_id = %upload_id,
                    chunk = index,
                    progress = upload.progress(),
                    "Chunk stored"
                );
                Ok((upload, etag))
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&path).await {
                    warn!(upload_id = %upload_id, chunk = index, error = %cleanup, "Orphan chunk cleanup failed");
                }
                Err(e)
            }
        }
    }

    /// Acknowledges a chunk uploaded through an external transfer without
    /// moving bytes through this service.
    pub async fn ack_chunk(
        &self,
        upload_id: UploadId,
        index: i32,
        etag: Option<String>,
    ) -> AppResult<Upload> {
        self.uploads
            .mark_chunk(upload_id, index, etag, Utc::now())
            .await
    }

    /// Fetches a ledger; progress and completion are derived on the entity.
    pub async fn get(&self, upload_id: UploadId) -> AppResult<Upload> {
        self.uploads
            .find(upload_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Upload {upload_id} not found")))
    }

    /// Finalizes a complete upload, materializing the file item.
    ///
    /// Incomplete ledgers fail with `Conflict` — the client should keep
    /// uploading and retry. A room deleted mid-upload is terminal
    /// (`NotFound`). Finalizing an already-completed upload returns the item
    /// materialized the first time, not a duplicate.
    pub async fn finalize(&self, ctx: &RequestContext, upload_id: UploadId) -> AppResult<Item> {
        let upload = self.get(upload_id).await?;
        let room = self.accessible_room(&upload).await?;

        match upload.status {
            UploadStatus::Completed => {
                let item_id = upload.item_id.ok_or_else(|| {
                    AppError::internal(format!("Completed upload {upload_id} has no item"))
                })?;
                return self.items.get_item(&room, item_id).await;
            }
            UploadStatus::Failed | UploadStatus::Cancelled => {
                return Err(AppError::conflict(format!(
                    "Upload {upload_id} is {} and cannot be finalized",
                    upload.status
                )));
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }
        if upload.expires_at <= Utc::now() {
            return Err(AppError::expired(format!(
                "Upload {upload_id} expired at {}",
                upload.expires_at
            )));
        }
        if !upload.is_complete() {
            return Err(AppError::conflict(format!(
                "Upload {upload_id} has {} of {} chunks; keep uploading",
                upload.uploaded_count(),
                upload.total_chunks
            )));
        }

        let assembled = self.assemble(&upload).await?;
        let final_key = format!("rooms/{}/{}/{}", room.id, upload.id, upload.filename);
        self.storage
            .write(&final_key, Bytes::from(assembled.clone()))
            .await?;

        let payload = ItemPayload::File {
            storage_key: final_key,
            filename: upload.filename.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: assembled.len() as i64,
            encrypted: upload.encrypted,
            iv: upload.iv.clone(),
        };
        let item = self.items.create_item(ctx, &room, None, payload, None).await?;

        if !self.uploads.complete(upload_id, item.id).await? {
            // Another finalize won the race; yield to its item.
            self.items.delete_item(&room, item.id).await?;
            let settled = self.get(upload_id).await?;
            let Some(winner) = settled.item_id else {
                return Err(AppError::conflict(format!(
                    "Upload {upload_id} was terminated during finalize"
                )));
            };
            return self.items.get_item(&room, winner).await;
        }

        if let Err(e) = self.storage.delete_prefix(&upload.storage_key).await {
            warn!(upload_id = %upload_id, error = %e, "Chunk cleanup after finalize failed");
        }

        info!(
            room = %room.code,
            upload_id = %upload_id,
            item = %item.id,
            size = item.payload.size_bytes(),
            "Upload finalized"
        );
        Ok(item)
    }

    /// Cancels an upload. Terminal: no further chunk acks are accepted.
    ///
    /// Cancelling an already-cancelled upload is a no-op.
    pub async fn cancel(&self, upload_id: UploadId) -> AppResult<Upload> {
        let upload = self.get(upload_id).await?;
        match upload.status {
            UploadStatus::Cancelled => return Ok(upload),
            UploadStatus::Completed | UploadStatus::Failed => {
                return Err(AppError::conflict(format!(
                    "Upload {upload_id} is {} and cannot be cancelled",
                    upload.status
                )));
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }

        self.uploads
            .set_status(upload_id, UploadStatus::Cancelled)
            .await?;
        if let Err(e) = self.storage.delete_prefix(&upload.storage_key).await {
            warn!(upload_id = %upload_id, error = %e, "Chunk cleanup after cancel failed");
        }
        info!(upload_id = %upload_id, "Upload cancelled");
        self.get(upload_id).await
    }

    /// Reaper hook: destroys unfinished uploads past their expiry.
    ///
    /// An expired upload is unrecoverable; the client restarts the transfer
    /// from scratch.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = self.uploads.find_expired(now).await?;
        let mut removed = 0u64;
        for upload in expired {
            if let Err(e) = self.storage.delete_prefix(&upload.storage_key).await {
                warn!(upload_id = %upload.id, error = %e, "Expired chunk cleanup failed");
            }
            if self.uploads.delete(upload.id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Reaped expired uploads");
        }
        Ok(removed)
    }

    /// Destroys every upload of a room (room deletion/expiry).
    pub async fn destroy_room_uploads(&self, room: &Room) -> AppResult<u64> {
        let uploads = self.uploads.list_by_room(room.id).await?;
        let mut removed = 0u64;
        for upload in uploads {
            if let Err(e) = self.storage.delete_prefix(&upload.storage_key).await {
                warn!(upload_id = %upload.id, error = %e, "Room upload cleanup failed");
            }
            if self.uploads.delete(upload.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// The room behind an upload, or terminal `NotFound` if it is gone.
    async fn accessible_room(&self, upload: &Upload) -> AppResult<Room> {
        let room = self
            .rooms
            .find_by_id(upload.room_id)
            .await?
            .filter(|r| r.deleted_at.is_none() && r.is_accessible(Utc::now()))
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Room behind upload {} no longer exists",
                    upload.id
                ))
            })?;
        Ok(room)
    }

    /// Reads every chunk in index order and concatenates the bytes.
    async fn assemble(&self, upload: &Upload) -> AppResult<Vec<u8>> {
        let mut assembled = Vec::with_capacity(upload.total_size.max(0) as usize);
        for index in 0..upload.total_chunks {
            let path = chunk_path(&upload.storage_key, index);
            let data = self.storage.read_bytes(&path).await.map_err(|e| {
                if e.kind == ErrorKind::NotFound {
                    AppError::conflict(format!(
                        "Chunk {index} of upload {} is acknowledged but missing from storage",
                        upload.id
                    ))
                } else {
                    e
                }
            })?;
            assembled.extend_from_slice(&data);
        }
        Ok(assembled)
    }
}

/// Storage path of one chunk within an upload's key prefix.
fn chunk_path(storage_key: &str, index: i32) -> String {
    format!("{storage_key}/chunk_{index:06}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomdrop_core::config::room::RoomConfig;
    use roomdrop_core::types::id::RoomId;
    use roomdrop_database::memory::{
        MemoryItemStore, MemoryRoomStore, MemoryUploadStore, MemoryVersionStore,
    };
    use roomdrop_entity::room::{RoomAccess, RoomCode, RoomLifespan, RoomMode, RoomSettings};
    use roomdrop_storage::LocalStorageProvider;

    use crate::item::versions::VersionService;

    struct Fixture {
        service: UploadService,
        uploads: Arc<MemoryUploadStore>,
        rooms: Arc<MemoryRoomStore>,
        room: Room,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Arc::new(
            LocalStorageProvider::new(dir.path().to_str().expect("utf8 path"))
                .await
                .expect("storage root"),
        );
        let uploads = Arc::new(MemoryUploadStore::new());
        let rooms = Arc::new(MemoryRoomStore::new());
        let items = ItemService::new(
            Arc::new(MemoryItemStore::new()),
            VersionService::new(Arc::new(MemoryVersionStore::new())),
        );

        let now = Utc::now();
        let room = Room {
            id: RoomId::new(),
            code: RoomCode::generate(),
            mode: RoomMode::Internet,
            access: RoomAccess::Public,
            lifespan: RoomLifespan::Persistent,
            owner: None,
            password_hash: None,
            settings: RoomSettings::from_config(&RoomConfig::default()),
            last_activity_at: now,
            deleted_at: None,
            expires_at: None,
            created_at: now,
        };
        let room = rooms.create(&room).await.expect("room");

        let service = UploadService::new(
            uploads.clone(),
            rooms.clone(),
            items,
            storage,
            StorageConfig::default(),
        );
        Fixture {
            service,
            uploads,
            rooms,
            room,
            _dir: dir,
        }
    }

    fn params(total_chunks: i32) -> InitUploadParams {
        InitUploadParams {
            filename: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            total_size: 12,
            total_chunks,
            encrypted: false,
            iv: None,
            external_transfer_id: None,
        }
    }

    #[tokio::test]
    async fn test_init_validations() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");

        let err = f
            .service
            .init_upload(&ctx, &f.room, params(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let mut oversized = params(1);
        oversized.total_size = f.room.settings.max_file_size_bytes as i64 + 1;
        let err = f
            .service
            .init_upload(&ctx, &f.room, oversized)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let mut encrypted = params(1);
        encrypted.encrypted = true;
        encrypted.iv = Some("not base64 !!".to_string());
        let err = f
            .service
            .init_upload(&ctx, &f.room, encrypted)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_mime_allowlist_enforced() {
        let mut f = fixture().await;
        f.room.settings.allowed_mime_types = vec!["image/*".to_string()];
        let ctx = RequestContext::for_peer("alice");

        let err = f
            .service
            .init_upload(&ctx, &f.room, params(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_three_chunk_scenario_with_idempotent_finalize() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(3)).await.unwrap();
        assert_eq!(upload.status, UploadStatus::Pending);

        let (u, _) = f
            .service
            .store_chunk(upload.id, 1, Bytes::from_static(b"bbbb"))
            .await
            .unwrap();
        assert_eq!(u.status, UploadStatus::Uploading);
        // Re-acking the same chunk is a no-op, not an error.
        let (u, _) = f
            .service
            .store_chunk(upload.id, 1, Bytes::from_static(b"bbbb"))
            .await
            .unwrap();
        assert_eq!(u.progress(), 34);
        let (u, _) = f
            .service
            .store_chunk(upload.id, 2, Bytes::from_static(b"cccc"))
            .await
            .unwrap();
        assert_eq!(u.progress(), 67);
        assert!(!u.is_complete());

        // Finalize before the last chunk is a retryable conflict.
        let err = f.service.finalize(&ctx, upload.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let (u, _) = f
            .service
            .store_chunk(upload.id, 0, Bytes::from_static(b"aaaa"))
            .await
            .unwrap();
        assert_eq!(u.progress(), 100);
        assert!(u.is_complete());

        let item = f.service.finalize(&ctx, upload.id).await.unwrap();
        let ItemPayload::File { size_bytes, ref filename, .. } = item.payload else {
            panic!("expected file payload");
        };
        assert_eq!(size_bytes, 12);
        assert_eq!(filename, "notes.txt");

        let again = f.service.finalize(&ctx, upload.id).await.unwrap();
        assert_eq!(again.id, item.id);
    }

    #[tokio::test]
    async fn test_chunk_index_out_of_range() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(3)).await.unwrap();

        let err = f
            .service
            .store_chunk(upload.id, 3, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_cancel_is_terminal_and_idempotent() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(2)).await.unwrap();
        f.service
            .store_chunk(upload.id, 0, Bytes::from_static(b"aa"))
            .await
            .unwrap();

        let cancelled = f.service.cancel(upload.id).await.unwrap();
        assert_eq!(cancelled.status, UploadStatus::Cancelled);
        // No further acks accepted.
        let err = f
            .service
            .store_chunk(upload.id, 1, Bytes::from_static(b"bb"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        // Cancelling again is a no-op.
        let again = f.service.cancel(upload.id).await.unwrap();
        assert_eq!(again.status, UploadStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reaper_destroys_expired_upload() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(2)).await.unwrap();

        // Nothing to reap while the upload is fresh.
        assert_eq!(f.service.expire_stale(Utc::now()).await.unwrap(), 0);

        let past = upload.expires_at + Duration::seconds(1);
        assert_eq!(f.service.expire_stale(past).await.unwrap(), 1);

        // A reaped upload is indistinguishable from one that never existed.
        let err = f
            .service
            .store_chunk(upload.id, 0, Bytes::from_static(b"aa"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_expired_ack_before_reap() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(1)).await.unwrap();

        let future = upload.expires_at + Duration::seconds(1);
        let err = f
            .service
            .uploads
            .mark_chunk(upload.id, 0, None, future)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
    }

    #[tokio::test]
    async fn test_finalize_after_room_deleted_is_terminal() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        let upload = f.service.init_upload(&ctx, &f.room, params(1)).await.unwrap();
        f.service
            .store_chunk(upload.id, 0, Bytes::from_static(b"aa"))
            .await
            .unwrap();

        f.rooms.soft_delete(f.room.id, Utc::now()).await.unwrap();

        let err = f.service.finalize(&ctx, upload.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_destroy_room_uploads() {
        let f = fixture().await;
        let ctx = RequestContext::for_peer("alice");
        f.service.init_upload(&ctx, &f.room, params(2)).await.unwrap();
        f.service.init_upload(&ctx, &f.room, params(2)).await.unwrap();

        assert_eq!(f.service.destroy_room_uploads(&f.room).await.unwrap(), 2);
        assert!(f.uploads.find_expired(Utc::now() + Duration::days(30)).await.unwrap().is_empty());
    }
}

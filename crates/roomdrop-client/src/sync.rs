//! The drain worker: replays queued operations against the server.
//!
//! One logical worker per client: the drain gate guarantees no two drains
//! run concurrently, which is what preserves per-resource ordering. Within
//! a drain, operations sharing a resource key apply strictly in enqueue
//! order; independent resources proceed past a blocked one.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use roomdrop_core::config::sync::SyncConfig;
use roomdrop_core::result::AppResult;

use crate::op::{OpStatus, Operation, PendingOperation};
use crate::remote::RemoteApi;
use crate::store::ClientStore;

/// Capacity of the lifecycle event channel.
const EVENT_BUFFER: usize = 64;

/// Typed lifecycle signals of the sync engine.
///
/// Delivered on a broadcast channel; an observer interface, not callback
/// registration. A slow observer misses events, never blocks the drain.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The connectivity heuristic changed state.
    ConnectivityChanged {
        /// Whether the client now considers itself online.
        online: bool,
    },
    /// A drain pass began.
    DrainStarted,
    /// The server acknowledged an operation.
    OpSynced {
        /// Queue sequence number.
        seq: i64,
        /// Operation kind.
        kind: &'static str,
    },
    /// An operation was parked as permanently failed.
    OpFailed {
        /// Queue sequence number.
        seq: i64,
        /// Operation kind.
        kind: &'static str,
        /// Why it failed.
        error: String,
    },
    /// A drain pass finished.
    DrainFinished {
        /// Operations acknowledged this drain.
        synced: u64,
        /// Operations parked as failed this drain.
        failed: u64,
    },
}

/// Counts from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Operations acknowledged and removed.
    pub synced: u64,
    /// Operations parked as permanently failed.
    pub failed: u64,
}

/// Client-side reconciliation engine.
pub struct SyncEngine {
    store: Arc<ClientStore>,
    remote: Arc<dyn RemoteApi>,
    config: SyncConfig,
    online: AtomicBool,
    drain_gate: Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.is_online())
            .finish()
    }
}

impl SyncEngine {
    /// Create an engine over a durable store and a server endpoint.
    ///
    /// Starts offline; the embedding application flips connectivity via
    /// [`SyncEngine::set_online`] or vouches for it with
    /// [`SyncEngine::sync_now`].
    pub fn new(
        store: Arc<ClientStore>,
        remote: Arc<dyn RemoteApi>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Arc::new(Self {
            store,
            remote,
            config,
            online: AtomicBool::new(false),
            drain_gate: Mutex::new(()),
            events,
        })
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The durable store (queue inspection, cached items).
    pub fn store(&self) -> &Arc<ClientStore> {
        &self.store
    }

    /// Whether the connectivity heuristic currently reports online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Update the connectivity heuristic. Coming online triggers a drain.
    pub fn set_online(self: &Arc<Self>, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        info!(online, "Connectivity changed");
        let _ = self.events.send(SyncEvent::ConnectivityChanged { online });
        if online {
            self.trigger_drain();
        }
    }

    /// Durably stage an operation. Never blocks on the network.
    ///
    /// If the client is online a background drain starts immediately;
    /// offline, the operation waits for the next connectivity change.
    pub fn enqueue(self: &Arc<Self>, op: Operation) -> AppResult<PendingOperation> {
        let staged = self.store.enqueue(&op)?;
        debug!(seq = staged.seq, kind = op.kind(), "Operation staged");
        if self.is_online() {
            self.trigger_drain();
        }
        Ok(staged)
    }

    /// Force a drain regardless of the connectivity heuristic.
    ///
    /// The explicit call vouches for connectivity, so the heuristic flips
    /// online as a side effect.
    pub async fn sync_now(self: &Arc<Self>) -> AppResult<DrainSummary> {
        let was = self.online.swap(true, Ordering::SeqCst);
        if !was {
            let _ = self.events.send(SyncEvent::ConnectivityChanged { online: true });
        }
        self.drain().await
    }

    /// Permanently failed operations awaiting manual resolution.
    pub fn failed_operations(&self) -> AppResult<Vec<PendingOperation>> {
        self.store.failed()
    }

    /// Re-attempt a permanently failed operation.
    pub fn retry_failed(self: &Arc<Self>, seq: i64) -> AppResult<bool> {
        let requeued = self.store.retry_failed(seq)?;
        if requeued && self.is_online() {
            self.trigger_drain();
        }
        Ok(requeued)
    }

    /// Discard a permanently failed operation.
    pub fn discard(&self, seq: i64) -> AppResult<bool> {
        self.store.remove(seq)
    }

    fn trigger_drain(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.drain().await {
                warn!(error = %e, "Background drain failed");
            }
        });
    }

    /// Replay the queue against the server.
    ///
    /// Holds the drain gate for the whole pass, so concurrent callers
    /// serialize; per-resource enqueue order is never violated.
    pub async fn drain(&self) -> AppResult<DrainSummary> {
        let _gate = self.drain_gate.lock().await;
        let _ = self.events.send(SyncEvent::DrainStarted);
        let mut summary = DrainSummary::default();

        'drain: loop {
            let ops = self.store.pending_in_order()?;
            if ops.is_empty() {
                break;
            }

            // Resources parked this pass: transient failures defer their
            // remaining ops to the next pass; permanent failures poison
            // them outright.
            let mut deferred: HashSet<String> = HashSet::new();
            let mut poisoned: HashSet<String> = HashSet::new();
            let mut progressed = false;
            let mut retry_wait: Option<Duration> = None;

            for staged in ops {
                if !self.is_online() {
                    info!("Connectivity lost mid-drain; remaining operations stay queued");
                    break 'drain;
                }

                let key = staged.op.resource_key();
                if deferred.contains(&key) {
                    continue;
                }
                if poisoned.contains(&key) {
                    // Applying this after its predecessor failed would
                    // reorder the resource's history.
                    let message = "An earlier operation on this resource failed";
                    self.store
                        .set_status(staged.seq, OpStatus::Failed, Some(message))?;
                    summary.failed += 1;
                    let _ = self.events.send(SyncEvent::OpFailed {
                        seq: staged.seq,
                        kind: staged.op.kind(),
                        error: message.to_string(),
                    });
                    continue;
                }

                self.store.set_status(staged.seq, OpStatus::Syncing, None)?;
                match self.apply(&staged.op).await {
                    Ok(()) => {
                        self.store.remove(staged.seq)?;
                        summary.synced += 1;
                        progressed = true;
                        debug!(seq = staged.seq, kind = staged.op.kind(), "Operation synced");
                        let _ = self.events.send(SyncEvent::OpSynced {
                            seq: staged.seq,
                            kind: staged.op.kind(),
                        });
                    }
                    Err(e) if e.kind.is_retryable() => {
                        let retries = self.store.increment_retry(staged.seq)?;
                        if retries >= self.config.max_retries {
                            warn!(
                                seq = staged.seq,
                                kind = staged.op.kind(),
                                retries,
                                error = %e,
                                "Retries exhausted; operation parked for manual resolution"
                            );
                            self.store
                                .set_status(staged.seq, OpStatus::Failed, Some(&e.message))?;
                            summary.failed += 1;
                            poisoned.insert(key);
                            let _ = self.events.send(SyncEvent::OpFailed {
                                seq: staged.seq,
                                kind: staged.op.kind(),
                                error: e.message,
                            });
                        } else {
                            debug!(
                                seq = staged.seq,
                                retries,
                                error = %e,
                                "Transient failure; operation requeued"
                            );
                            self.store
                                .set_status(staged.seq, OpStatus::Pending, Some(&e.message))?;
                            let delay = self.backoff(retries);
                            retry_wait = Some(retry_wait.map_or(delay, |w| w.min(delay)));
                            deferred.insert(key);
                        }
                    }
                    Err(e) => {
                        // Conflict, not-found, validation: retrying cannot
                        // win, and overwriting silently is worse.
                        warn!(
                            seq = staged.seq,
                            kind = staged.op.kind(),
                            error = %e,
                            "Operation rejected; parked for manual resolution"
                        );
                        self.store
                            .set_status(staged.seq, OpStatus::Failed, Some(&e.message))?;
                        summary.failed += 1;
                        poisoned.insert(key);
                        let _ = self.events.send(SyncEvent::OpFailed {
                            seq: staged.seq,
                            kind: staged.op.kind(),
                            error: e.message,
                        });
                    }
                }
            }

            if let Some(delay) = retry_wait {
                tokio::time::sleep(delay).await;
            } else if !progressed {
                break;
            }
        }

        let _ = self.events.send(SyncEvent::DrainFinished {
            synced: summary.synced,
            failed: summary.failed,
        });
        if summary.synced > 0 || summary.failed > 0 {
            info!(
                synced = summary.synced,
                failed = summary.failed,
                "Drain finished"
            );
        }
        Ok(summary)
    }

    /// Invoke the server endpoint for one operation and merge the
    /// authoritative response into the local cache (the server's version
    /// wins).
    async fn apply(&self, op: &Operation) -> AppResult<()> {
        match op {
            Operation::CreateItem {
                room_code,
                item_id,
                payload,
                parent_id,
            } => {
                let item = self
                    .remote
                    .create_item(room_code, *item_id, payload, *parent_id)
                    .await?;
                self.store.cache_item(room_code, &item)
            }
            Operation::UpdateItem {
                room_code,
                item_id,
                payload,
            } => {
                let item = self.remote.update_item(*item_id, payload).await?;
                self.store.cache_item(room_code, &item)
            }
            Operation::DeleteItem { item_id, .. } => {
                self.remote.delete_item(*item_id).await?;
                self.store.remove_cached_item(*item_id)?;
                Ok(())
            }
            Operation::UploadChunk {
                upload_id,
                index,
                data,
                ..
            } => {
                self.remote
                    .upload_chunk(*upload_id, *index, data.clone())
                    .await?;
                Ok(())
            }
        }
    }

    /// Exponential backoff for the nth retry, capped.
    fn backoff(&self, retries: u32) -> Duration {
        let exponent = retries.saturating_sub(1).min(16);
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use roomdrop_core::error::{AppError, ErrorKind};
    use roomdrop_core::types::id::{ItemId, RoomId, UploadId};
    use roomdrop_entity::item::{Item, ItemPayload};

    use crate::remote::ChunkAck;

    /// In-memory server double with a scriptable failure plan.
    #[derive(Debug, Default)]
    struct MockRemote {
        items: StdMutex<HashMap<ItemId, Item>>,
        calls: StdMutex<Vec<String>>,
        fail_plan: StdMutex<VecDeque<ErrorKind>>,
    }

    impl MockRemote {
        fn scripted(failures: &[ErrorKind]) -> Arc<Self> {
            let mock = Self::default();
            *mock.fail_plan.lock().unwrap() = failures.iter().copied().collect();
            Arc::new(mock)
        }

        fn record(&self, call: impl Into<String>) -> AppResult<()> {
            self.calls.lock().unwrap().push(call.into());
            if let Some(kind) = self.fail_plan.lock().unwrap().pop_front() {
                return Err(AppError::new(kind, "scripted failure"));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn item_count(&self) -> usize {
            self.items.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteApi for MockRemote {
        async fn create_item(
            &self,
            _room_code: &str,
            item_id: ItemId,
            payload: &ItemPayload,
            parent_id: Option<ItemId>,
        ) -> AppResult<Item> {
            self.record(format!("create {item_id}"))?;
            let now = Utc::now();
            let item = Item {
                id: item_id,
                room_id: RoomId::new(),
                payload: payload.clone(),
                parent_id,
                created_by: None,
                current_version: 1,
                created_at: now,
                updated_at: now,
            };
            self.items.lock().unwrap().insert(item_id, item.clone());
            Ok(item)
        }

        async fn update_item(&self, item_id: ItemId, payload: &ItemPayload) -> AppResult<Item> {
            self.record(format!("update {item_id}"))?;
            let mut items = self.items.lock().unwrap();
            let item = items
                .get_mut(&item_id)
                .ok_or_else(|| AppError::not_found("Item not found"))?;
            item.payload = payload.clone();
            item.current_version += 1;
            item.updated_at = Utc::now();
            Ok(item.clone())
        }

        async fn delete_item(&self, item_id: ItemId) -> AppResult<()> {
            self.record(format!("delete {item_id}"))?;
            self.items.lock().unwrap().remove(&item_id);
            Ok(())
        }

        async fn upload_chunk(
            &self,
            upload_id: UploadId,
            index: i32,
            _data: Vec<u8>,
        ) -> AppResult<ChunkAck> {
            self.record(format!("chunk {upload_id}/{index}"))?;
            Ok(ChunkAck {
                index,
                etag: "etag".to_string(),
                progress: 100,
                complete: true,
            })
        }
    }

    fn fast_config(max_retries: u32) -> SyncConfig {
        SyncConfig {
            max_retries,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
            request_timeout_seconds: 1,
        }
    }

    fn engine(remote: Arc<MockRemote>, max_retries: u32) -> (Arc<SyncEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ClientStore::open_at(&dir.path().join("client.db")).unwrap());
        (
            SyncEngine::new(store, remote, fast_config(max_retries)),
            dir,
        )
    }

    fn text(content: &str) -> ItemPayload {
        ItemPayload::Text {
            content: content.to_string(),
        }
    }

    fn room() -> String {
        "ABCD2345".to_string()
    }

    #[tokio::test]
    async fn test_offline_create_update_delete_drains_in_order() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let item_id = ItemId::new();

        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id,
                payload: text("v1"),
                parent_id: None,
            })
            .unwrap();
        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id,
                payload: text("v2"),
            })
            .unwrap();
        engine
            .enqueue(Operation::DeleteItem {
                room_code: room(),
                item_id,
            })
            .unwrap();

        // Offline: nothing reached the server yet.
        assert!(remote.calls().is_empty());

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary, DrainSummary { synced: 3, failed: 0 });

        // The delete was last in, so the item must stay deleted.
        assert_eq!(remote.item_count(), 0);
        assert_eq!(
            remote.calls(),
            vec![
                format!("create {item_id}"),
                format!("update {item_id}"),
                format!("delete {item_id}"),
            ]
        );
        assert_eq!(engine.store().queue_len().unwrap(), 0);
        assert!(engine.store().cached_item(item_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enqueue_while_online_drains_in_background() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let mut events = engine.subscribe();
        engine.set_online(true);

        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id: ItemId::new(),
                payload: text("hello"),
                parent_id: None,
            })
            .unwrap();

        let deadline = tokio::time::Duration::from_secs(2);
        let synced = tokio::time::timeout(deadline, async {
            loop {
                match events.recv().await.unwrap() {
                    SyncEvent::DrainFinished { synced, .. } if synced > 0 => return synced,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(synced, 1);
        assert_eq!(remote.item_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_to_success() {
        let remote = MockRemote::scripted(&[ErrorKind::Transient]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let item_id = ItemId::new();
        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id,
                payload: text("flaky"),
                parent_id: None,
            })
            .unwrap();

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary, DrainSummary { synced: 1, failed: 0 });
        // First attempt failed, second succeeded.
        assert_eq!(remote.calls().len(), 2);
        // Transient failures are invisible: the cache got the server item.
        assert!(engine.store().cached_item(item_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retry_cap_parks_operation_as_failed() {
        let remote = MockRemote::scripted(&[
            ErrorKind::Transient,
            ErrorKind::Transient,
            ErrorKind::Transient,
        ]);
        let (engine, _dir) = engine(remote.clone(), 2);
        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id: ItemId::new(),
                payload: text("doomed"),
                parent_id: None,
            })
            .unwrap();

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary, DrainSummary { synced: 0, failed: 1 });

        let failed = engine.failed_operations().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].retry_count, 2);
        assert_eq!(failed[0].last_error.as_deref(), Some("scripted failure"));
    }

    #[tokio::test]
    async fn test_conflict_parks_immediately_and_poisons_the_resource() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let item_id = ItemId::new();

        // Updates against an item the server never saw: NotFound, terminal.
        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id,
                payload: text("v2"),
            })
            .unwrap();
        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id,
                payload: text("v3"),
            })
            .unwrap();

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary, DrainSummary { synced: 0, failed: 2 });

        let failed = engine.failed_operations().unwrap();
        assert_eq!(failed.len(), 2);
        // No retry for genuine conflicts.
        assert_eq!(failed[0].retry_count, 0);
        // Only the first op reached the server; the second was poisoned.
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_independent_resources_proceed_past_a_blocked_one() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let missing = ItemId::new();
        let fresh = ItemId::new();

        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id: missing,
                payload: text("ghost"),
            })
            .unwrap();
        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id: fresh,
                payload: text("alive"),
                parent_id: None,
            })
            .unwrap();

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary, DrainSummary { synced: 1, failed: 1 });
        assert_eq!(remote.item_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_op_can_be_retried_manually() {
        let remote = MockRemote::scripted(&[ErrorKind::Transient]);
        let (engine, _dir) = engine(remote.clone(), 1);
        let item_id = ItemId::new();
        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id,
                payload: text("second chance"),
                parent_id: None,
            })
            .unwrap();

        // A single allowed retry exhausts on the scripted failure.
        engine.sync_now().await.unwrap();
        let failed = engine.failed_operations().unwrap();
        assert_eq!(failed.len(), 1);

        // Manual re-attempt succeeds once the scripted failure ran out.
        // (retry_failed may also kick a background drain; both serialize
        // on the drain gate, so only the end state is asserted.)
        assert!(engine.retry_failed(failed[0].seq).unwrap());
        engine.sync_now().await.unwrap();
        assert_eq!(engine.store().queue_len().unwrap(), 0);
        assert_eq!(remote.item_count(), 1);
    }

    #[tokio::test]
    async fn test_discard_removes_failed_op() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let item_id = ItemId::new();
        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id,
                payload: text("ghost"),
            })
            .unwrap();
        engine.sync_now().await.unwrap();

        let failed = engine.failed_operations().unwrap();
        assert!(engine.discard(failed[0].seq).unwrap());
        assert_eq!(engine.store().queue_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_tracks_server_versions() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let item_id = ItemId::new();

        engine
            .enqueue(Operation::CreateItem {
                room_code: room(),
                item_id,
                payload: text("v1"),
                parent_id: None,
            })
            .unwrap();
        engine
            .enqueue(Operation::UpdateItem {
                room_code: room(),
                item_id,
                payload: text("v2"),
            })
            .unwrap();
        engine.sync_now().await.unwrap();

        let cached = engine.store().cached_item(item_id).unwrap().unwrap();
        assert_eq!(cached.current_version, 2);
        assert!(matches!(
            cached.payload,
            ItemPayload::Text { ref content } if content == "v2"
        ));
    }

    #[tokio::test]
    async fn test_chunk_ops_replay_through_the_queue() {
        let remote = MockRemote::scripted(&[]);
        let (engine, _dir) = engine(remote.clone(), 3);
        let upload_id = UploadId::new();

        for index in 0..3 {
            engine
                .enqueue(Operation::UploadChunk {
                    room_code: room(),
                    upload_id,
                    index,
                    data: vec![index as u8; 4],
                })
                .unwrap();
        }

        let summary = engine.sync_now().await.unwrap();
        assert_eq!(summary.synced, 3);
        assert_eq!(
            remote.calls(),
            vec![
                format!("chunk {upload_id}/0"),
                format!("chunk {upload_id}/1"),
                format!("chunk {upload_id}/2"),
            ]
        );
    }
}

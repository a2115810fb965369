//! Durable client-side store: operation queue and item cache.
//!
//! One SQLite file (WAL mode) holds both the reconciliation queue and the
//! local item cache. The essential contract is durability across process
//! restart and ordered replay; operations found mid-`syncing` at open time
//! are requeued as `pending`, never lost.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::info;

use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::ItemId;
use roomdrop_entity::item::Item;

use crate::op::{OpStatus, Operation, PendingOperation};

/// Durable store backing the reconciliation queue and local cache.
///
/// All operations are short, local, and synchronous; the connection lock
/// is never held across an await point.
pub struct ClientStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for ClientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStore").field("path", &self.path).finish()
    }
}

impl ClientStore {
    /// Open (or create) the store at an explicit path.
    pub fn open_at(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err)?;

        run_migrations(&conn)?;

        // A crash mid-drain leaves operations stuck in `syncing`; they were
        // never acknowledged, so they go back to the queue.
        let requeued = conn
            .execute(
                "UPDATE pending_ops SET status = 'pending' WHERE status = 'syncing'",
                [],
            )
            .map_err(db_err)?;
        if requeued > 0 {
            info!(requeued, "Requeued operations interrupted by a previous shutdown");
        }

        info!(path = %path.display(), "Client store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Filesystem path of the open store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::internal("Client store lock poisoned"))?;
        f(&conn)
    }

    // ── Queue ───────────────────────────────────────────────────

    /// Durably stage an operation at the tail of the queue.
    pub fn enqueue(&self, op: &Operation) -> AppResult<PendingOperation> {
        let payload = serde_json::to_string(op)?;
        let created_at = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_ops (kind, room_code, resource_key, payload, created_at, retry_count, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending')",
                params![
                    op.kind(),
                    op.room_code(),
                    op.resource_key(),
                    payload,
                    created_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            let seq = conn.last_insert_rowid();
            Ok(PendingOperation {
                seq,
                op: op.clone(),
                created_at,
                retry_count: 0,
                status: OpStatus::Pending,
                last_error: None,
            })
        })
    }

    /// All `pending` operations in enqueue order.
    pub fn pending_in_order(&self) -> AppResult<Vec<PendingOperation>> {
        self.ops_with_status("pending")
    }

    /// All permanently `failed` operations, for manual resolution.
    pub fn failed(&self) -> AppResult<Vec<PendingOperation>> {
        self.ops_with_status("failed")
    }

    fn ops_with_status(&self, status: &str) -> AppResult<Vec<PendingOperation>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT seq, payload, created_at, retry_count, status, last_error
                     FROM pending_ops WHERE status = ?1 ORDER BY seq",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![status], row_to_pending)
                .map_err(db_err)?;
            collect_ops(rows)
        })
    }

    /// Look one operation up by sequence number.
    pub fn get(&self, seq: i64) -> AppResult<Option<PendingOperation>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT seq, payload, created_at, retry_count, status, last_error
                     FROM pending_ops WHERE seq = ?1",
                )
                .map_err(db_err)?;
            let rows = stmt.query_map(params![seq], row_to_pending).map_err(db_err)?;
            Ok(collect_ops(rows)?.into_iter().next())
        })
    }

    /// Update an operation's status and failure message.
    pub fn set_status(
        &self,
        seq: i64,
        status: OpStatus,
        last_error: Option<&str>,
    ) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE pending_ops SET status = ?2, last_error = ?3 WHERE seq = ?1",
                params![seq, status.as_str(), last_error],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    /// Increment an operation's retry count, returning the new count.
    pub fn increment_retry(&self, seq: i64) -> AppResult<u32> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE pending_ops SET retry_count = retry_count + 1 WHERE seq = ?1",
                params![seq],
            )
            .map_err(db_err)?;
            conn.query_row(
                "SELECT retry_count FROM pending_ops WHERE seq = ?1",
                params![seq],
                |row| row.get::<_, u32>(0),
            )
            .map_err(db_err)
        })
    }

    /// Remove an acknowledged (or discarded) operation.
    pub fn remove(&self, seq: i64) -> AppResult<bool> {
        self.with_conn(|conn| {
            let affected = conn
                .execute("DELETE FROM pending_ops WHERE seq = ?1", params![seq])
                .map_err(db_err)?;
            Ok(affected > 0)
        })
    }

    /// Manually re-attempt a permanently failed operation.
    pub fn retry_failed(&self, seq: i64) -> AppResult<bool> {
        self.with_conn(|conn| {
            let affected = conn
                .execute(
                    "UPDATE pending_ops
                     SET status = 'pending', retry_count = 0, last_error = NULL
                     WHERE seq = ?1 AND status = 'failed'",
                    params![seq],
                )
                .map_err(db_err)?;
            Ok(affected > 0)
        })
    }

    /// Number of operations still in the queue (any status).
    pub fn queue_len(&self) -> AppResult<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM pending_ops", [], |row| {
                row.get::<_, u64>(0)
            })
            .map_err(db_err)
        })
    }

    // ── Item cache ──────────────────────────────────────────────

    /// Merge an authoritative server item into the cache.
    ///
    /// Last-writer-wins by server version: a stale response never
    /// overwrites a newer cached item.
    pub fn cache_item(&self, room_code: &str, item: &Item) -> AppResult<()> {
        let body = serde_json::to_string(item)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cached_items (id, room_code, item, current_version, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                     room_code = excluded.room_code,
                     item = excluded.item,
                     current_version = excluded.current_version,
                     cached_at = excluded.cached_at
                 WHERE excluded.current_version >= cached_items.current_version",
                params![
                    item.id.to_string(),
                    room_code,
                    body,
                    item.current_version,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    /// One cached item by id.
    pub fn cached_item(&self, id: ItemId) -> AppResult<Option<Item>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT item FROM cached_items WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(db_err(e)),
            }
        })
    }

    /// All cached items of one room.
    pub fn cached_items(&self, room_code: &str) -> AppResult<Vec<Item>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT item FROM cached_items WHERE room_code = ?1 ORDER BY cached_at")
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![room_code], |row| row.get::<_, String>(0))
                .map_err(db_err)?;
            let mut items = Vec::new();
            for body in rows {
                items.push(serde_json::from_str(&body.map_err(db_err)?)?);
            }
            Ok(items)
        })
    }

    /// Drop one item from the cache.
    pub fn remove_cached_item(&self, id: ItemId) -> AppResult<bool> {
        self.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM cached_items WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(db_err)?;
            Ok(affected > 0)
        })
    }
}

fn run_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pending_ops (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             kind TEXT NOT NULL,
             room_code TEXT NOT NULL,
             resource_key TEXT NOT NULL,
             payload TEXT NOT NULL,
             created_at TEXT NOT NULL,
             retry_count INTEGER NOT NULL DEFAULT 0,
             status TEXT NOT NULL DEFAULT 'pending',
             last_error TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_pending_ops_status ON pending_ops (status, seq);
         CREATE TABLE IF NOT EXISTS cached_items (
             id TEXT PRIMARY KEY,
             room_code TEXT NOT NULL,
             item TEXT NOT NULL,
             current_version INTEGER NOT NULL,
             cached_at TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_cached_items_room ON cached_items (room_code);",
    )
    .map_err(db_err)
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, u32, String, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_ops(
    rows: impl Iterator<Item = rusqlite::Result<(i64, String, String, u32, String, Option<String>)>>,
) -> AppResult<Vec<PendingOperation>> {
    let mut ops = Vec::new();
    for row in rows {
        let (seq, payload, created_at, retry_count, status, last_error) = row.map_err(db_err)?;
        ops.push(PendingOperation {
            seq,
            op: serde_json::from_str(&payload)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Serialization,
                        format!("Invalid timestamp in queue row {seq}"),
                        e,
                    )
                })?,
            retry_count,
            status: OpStatus::from_str(&status)?,
            last_error,
        });
    }
    Ok(ops)
}

fn db_err(e: rusqlite::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, format!("Client store error: {e}"), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomdrop_core::types::id::RoomId;
    use roomdrop_entity::item::ItemPayload;

    fn text_op(item_id: ItemId, content: &str) -> Operation {
        Operation::CreateItem {
            room_code: "ABCD2345".to_string(),
            item_id,
            payload: ItemPayload::Text {
                content: content.to_string(),
            },
            parent_id: None,
        }
    }

    fn item(version: i64) -> Item {
        let now = Utc::now();
        Item {
            id: ItemId::new(),
            room_id: RoomId::new(),
            payload: ItemPayload::Text {
                content: format!("v{version}"),
            },
            parent_id: None,
            created_by: None,
            current_version: version,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClientStore::open_at(&dir.path().join("client.db")).unwrap();

        let a = store.enqueue(&text_op(ItemId::new(), "a")).unwrap();
        let b = store.enqueue(&text_op(ItemId::new(), "b")).unwrap();
        assert!(a.seq < b.seq);

        let pending = store.pending_in_order().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].seq, a.seq);
        assert_eq!(pending[1].seq, b.seq);
    }

    #[test]
    fn test_queue_survives_reopen_and_requeues_syncing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");

        let staged = {
            let store = ClientStore::open_at(&path).unwrap();
            let staged = store.enqueue(&text_op(ItemId::new(), "durable")).unwrap();
            // Simulate a crash mid-drain.
            store
                .set_status(staged.seq, OpStatus::Syncing, None)
                .unwrap();
            staged
        };

        let store = ClientStore::open_at(&path).unwrap();
        let pending = store.pending_in_order().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].seq, staged.seq);
        assert_eq!(pending[0].status, OpStatus::Pending);
        assert_eq!(pending[0].op, staged.op);
    }

    #[test]
    fn test_failed_ops_surface_and_can_be_retried_or_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClientStore::open_at(&dir.path().join("client.db")).unwrap();

        let a = store.enqueue(&text_op(ItemId::new(), "a")).unwrap();
        let b = store.enqueue(&text_op(ItemId::new(), "b")).unwrap();
        store
            .set_status(a.seq, OpStatus::Failed, Some("item was deleted"))
            .unwrap();
        store.set_status(b.seq, OpStatus::Failed, Some("gone")).unwrap();

        let failed = store.failed().unwrap();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].last_error.as_deref(), Some("item was deleted"));

        assert!(store.retry_failed(a.seq).unwrap());
        assert_eq!(store.pending_in_order().unwrap().len(), 1);

        assert!(store.remove(b.seq).unwrap());
        assert_eq!(store.queue_len().unwrap(), 1);
    }

    #[test]
    fn test_retry_counter() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClientStore::open_at(&dir.path().join("client.db")).unwrap();
        let op = store.enqueue(&text_op(ItemId::new(), "x")).unwrap();

        assert_eq!(store.increment_retry(op.seq).unwrap(), 1);
        assert_eq!(store.increment_retry(op.seq).unwrap(), 2);
    }

    #[test]
    fn test_cache_merge_is_last_writer_wins_by_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClientStore::open_at(&dir.path().join("client.db")).unwrap();

        let mut fresh = item(3);
        store.cache_item("ABCD2345", &fresh).unwrap();

        // A stale response arriving late must not clobber the newer state.
        let mut stale = fresh.clone();
        stale.current_version = 2;
        stale.payload = ItemPayload::Text {
            content: "old".to_string(),
        };
        store.cache_item("ABCD2345", &stale).unwrap();
        let cached = store.cached_item(fresh.id).unwrap().unwrap();
        assert_eq!(cached.current_version, 3);

        fresh.current_version = 4;
        store.cache_item("ABCD2345", &fresh).unwrap();
        let cached = store.cached_item(fresh.id).unwrap().unwrap();
        assert_eq!(cached.current_version, 4);

        assert_eq!(store.cached_items("ABCD2345").unwrap().len(), 1);
        assert!(store.remove_cached_item(fresh.id).unwrap());
        assert!(store.cached_item(fresh.id).unwrap().is_none());
    }
}

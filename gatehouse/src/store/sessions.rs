//! Session store: one record file per live session.
//!
//! A session record lives at `<sessions_dir>/<session_id>.session`:
//!
//! ```text
//! username=<string>
//! created_at=<unix-epoch-seconds>
//! last_accessed_at=<unix-epoch-seconds>
//! ```
//!
//! `last_accessed_at` is the only mutable field. Updates go through
//! [`atomic::write_replace`], and `touch`/`delete` on the same id are
//! serialized through a per-id lock table, so a racing touch and delete end
//! in exactly one of two states: record gone, or record touched. A torn or
//! resurrected record is not a reachable outcome.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::store::atomic;
use crate::store::errors::{Result, StoreError};
use crate::types::{SessionId, abbrev_uuid};

/// A persisted session record. Timestamps are unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
    pub created_at: i64,
    pub last_accessed_at: i64,
}

impl SessionRecord {
    fn encode(&self) -> String {
        format!(
            "username={}\ncreated_at={}\nlast_accessed_at={}\n",
            self.username, self.created_at, self.last_accessed_at
        )
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut username = None;
        let mut created_at = None;
        let mut last_accessed_at = None;

        for line in content.lines() {
            match line.split_once('=') {
                Some(("username", value)) => username = Some(value.to_string()),
                Some(("created_at", value)) => {
                    created_at = Some(value.parse::<i64>().map_err(|_| corrupt("created_at is not an integer"))?);
                }
                Some(("last_accessed_at", value)) => {
                    last_accessed_at =
                        Some(value.parse::<i64>().map_err(|_| corrupt("last_accessed_at is not an integer"))?);
                }
                _ => {}
            }
        }

        match (username, created_at, last_accessed_at) {
            (Some(username), Some(created_at), Some(last_accessed_at)) => Ok(Self {
                username,
                created_at,
                last_accessed_at,
            }),
            _ => Err(corrupt("missing username=, created_at= or last_accessed_at= field")),
        }
    }
}

/// File-backed session-id -> record store.
pub struct SessionStore {
    dir: PathBuf,
    /// Per-id write serialization for `touch` vs `delete`. Entries are
    /// dropped again once no writer holds them.
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
        }
    }

    fn session_path(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{id}.session"))
    }

    fn lock_for(&self, id: SessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    fn release(&self, id: SessionId) {
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Create a session for `username` with `created_at = last_accessed_at = now`.
    ///
    /// Collisions on a fresh v4 id are cryptographically negligible; the
    /// retry below is a cheap backstop, not a correctness requirement.
    #[instrument(skip_all, fields(username = %username), err)]
    pub async fn create(&self, username: &str, now: DateTime<Utc>) -> Result<SessionId> {
        fs::create_dir_all(&self.dir).await?;

        let ts = now.timestamp();
        let record = SessionRecord {
            username: username.to_string(),
            created_at: ts,
            last_accessed_at: ts,
        };

        for _ in 0..3 {
            let id = Uuid::new_v4();
            match atomic::write_new(&self.session_path(id), &record.encode()).await {
                Ok(()) => return Ok(id),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Other(anyhow::anyhow!(
            "repeated session id collisions; random source is suspect"
        )))
    }

    /// Pure read; does not move `last_accessed_at`.
    pub async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>> {
        let path = self.session_path(id);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(SessionRecord::parse(&path, &content)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite only `last_accessed_at`, preserving every other field.
    #[instrument(skip_all, fields(session = %abbrev_uuid(&id)), err(level = "debug"))]
    pub async fn touch(&self, id: SessionId, now: DateTime<Utc>) -> Result<()> {
        let lock = self.lock_for(id);
        let result = {
            let _held = lock.lock().await;

            let path = self.session_path(id);
            match fs::read_to_string(&path).await {
                Ok(content) => {
                    let mut record = SessionRecord::parse(&path, &content)?;
                    record.last_accessed_at = now.timestamp();
                    atomic::write_replace(&path, &record.encode()).await?;
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
                Err(e) => Err(e.into()),
            }
        };
        drop(lock);
        self.release(id);
        result
    }

    /// Delete a session. Deleting an absent id is not an error.
    #[instrument(skip_all, fields(session = %abbrev_uuid(&id)), err)]
    pub async fn delete(&self, id: SessionId) -> Result<()> {
        let lock = self.lock_for(id);
        let result = {
            let _held = lock.lock().await;
            match fs::remove_file(self.session_path(id)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        };
        drop(lock);
        self.release(id);
        result
    }

    /// Remove every record whose sliding window has already lapsed.
    ///
    /// Validation does not depend on this: the guard deletes expired records
    /// on access. The sweep only keeps the directory from accumulating
    /// records nobody will present again.
    #[instrument(skip_all, err)]
    pub async fn sweep_expired(&self, now: DateTime<Utc>, timeout: Duration) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let timeout = timeout.as_secs() as i64;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("session") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<Uuid>().ok())
            else {
                continue;
            };

            match self.get(id).await {
                Ok(Some(record)) if now.timestamp() - record.last_accessed_at > timeout => {
                    self.delete(id).await?;
                    removed += 1;
                }
                Ok(_) => {}
                // Leave unreadable records alone; deleting them would hide
                // the underlying problem.
                Err(StoreError::Corrupt { path, reason }) => {
                    warn!(path = %path.display(), reason = %reason, "skipping corrupt session record");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn ts(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    fn test_store() -> (TempDir, SessionStore) {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("sessions"));
        (tmp, store)
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let (_tmp, store) = test_store();

        let id = store.create("alice", ts(0)).await.unwrap();
        let record = store.get(id).await.unwrap().unwrap();

        assert_eq!(record.username, "alice");
        assert_eq!(record.created_at, ts(0).timestamp());
        assert_eq!(record.last_accessed_at, record.created_at);
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let (_tmp, store) = test_store();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_format_on_disk() {
        let (tmp, store) = test_store();

        let id = store.create("alice", ts(0)).await.unwrap();
        let content = std::fs::read_to_string(tmp.path().join(format!("sessions/{id}.session"))).unwrap();

        let epoch = ts(0).timestamp();
        assert_eq!(
            content,
            format!("username=alice\ncreated_at={epoch}\nlast_accessed_at={epoch}\n")
        );
    }

    #[tokio::test]
    async fn touch_moves_only_last_accessed_at() {
        let (_tmp, store) = test_store();

        let id = store.create("alice", ts(0)).await.unwrap();
        store.touch(id, ts(600)).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.created_at, ts(0).timestamp());
        assert_eq!(record.last_accessed_at, ts(600).timestamp());
    }

    #[tokio::test]
    async fn touch_unknown_id_is_not_found() {
        let (_tmp, store) = test_store();
        let err = store.touch(Uuid::new_v4(), ts(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, store) = test_store();

        let id = store.create("alice", ts(0)).await.unwrap();
        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn issued_ids_do_not_collide() {
        // The id generator itself, across far more draws than any test
        // server will see.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(Uuid::new_v4()));
        }

        // And through the store, where a collision would also be caught by
        // the exclusive create.
        let (_tmp, store) = test_store();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(store.create("alice", ts(0)).await.unwrap()));
        }
    }

    #[tokio::test]
    async fn concurrent_touches_leave_one_well_formed_record() {
        let (_tmp, store) = test_store();
        let store = Arc::new(store);

        let id = store.create("alice", ts(0)).await.unwrap();

        let offsets: Vec<i64> = (1..=16).map(|i| i * 10).collect();
        let mut handles = Vec::new();
        for &offset in &offsets {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.touch(id, ts(offset)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.created_at, ts(0).timestamp());
        let attempted: Vec<i64> = offsets.iter().map(|o| ts(*o).timestamp()).collect();
        assert!(attempted.contains(&record.last_accessed_at));
    }

    #[tokio::test]
    async fn touch_delete_race_ends_deleted_or_touched() {
        let (_tmp, store) = test_store();
        let store = Arc::new(store);

        for round in 0..20 {
            let id = store.create("alice", ts(0)).await.unwrap();

            let toucher = {
                let store = store.clone();
                tokio::spawn(async move { store.touch(id, ts(round + 1)).await })
            };
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(id).await })
            };

            let touched = toucher.await.unwrap();
            deleter.await.unwrap().unwrap();
            assert!(matches!(&touched, Ok(()) | Err(StoreError::NotFound)));

            // Either outcome is fine; a torn or resurrected-after-delete
            // record is not.
            match store.get(id).await.unwrap() {
                None => {}
                Some(record) => {
                    assert!(touched.is_ok());
                    assert_eq!(record.username, "alice");
                    assert_eq!(record.last_accessed_at, ts(round + 1).timestamp());
                    store.delete(id).await.unwrap();
                }
            }
        }
    }

    #[tokio::test]
    async fn sweep_removes_only_lapsed_records() {
        let (_tmp, store) = test_store();
        let timeout = Duration::from_secs(1800);

        let stale = store.create("alice", ts(0)).await.unwrap();
        let fresh = store.create("bob", ts(1000)).await.unwrap();

        let removed = store.sweep_expired(ts(2000), timeout).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(stale).await.unwrap().is_none());
        assert!(store.get(fresh).await.unwrap().is_some());

        // Boundary: exactly at the window edge is still live.
        let edge = store.create("carol", ts(2000)).await.unwrap();
        assert_eq!(store.sweep_expired(ts(3800), timeout).await.unwrap(), 0);
        assert!(store.get(edge).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sweep_skips_corrupt_and_foreign_files() {
        let (tmp, store) = test_store();

        store.create("alice", ts(0)).await.unwrap();
        let dir = tmp.path().join("sessions");
        std::fs::write(dir.join(format!("{}.session", Uuid::new_v4())), "garbage\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "keep me\n").unwrap();

        let removed = store.sweep_expired(ts(10_000), Duration::from_secs(1800)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(dir.join("notes.txt").exists());
    }
}

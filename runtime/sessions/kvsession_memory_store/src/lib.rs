//! An in-memory storage backend for `kvsession`, geared towards testing and local development.
use std::{
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

use kvsession::store::{SessionStorageBackend, errors::BackendError};

/// Writes sweep the whole map for expired keys at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
/// An in-memory storage backend.
///
/// Expired keys are dropped the first time they're accessed after their deadline.
/// Keys that are never accessed again are reclaimed by a periodic sweep, piggybacking
/// on writes, or explicitly via [`InMemorySessionStore::delete_expired`].
/// Deadlines are computed using [`tokio::time::Instant`], so tests can
/// fast-forward through expirations with a paused clock.
///
/// # Limitations
///
/// This store won't persist data between server restarts.
/// It also won't synchronize data between multiple server instances.
/// It is primarily intended for testing and local development.
pub struct InMemorySessionStore(Arc<Mutex<State>>);

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore").finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct State {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl State {
    /// Drop every expired key if the last sweep is old enough.
    fn maybe_sweep(&mut self) {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.last_sweep = now;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_stale());
        let swept = before - self.entries.len();
        if swept > 0 {
            tracing::trace!(swept, "Swept expired keys");
        }
    }

    /// Look up `key`, evicting it if it has expired.
    fn get_if_fresh(&mut self, key: &str) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(Entry::is_stale) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    fn insert(&mut self, key: &str, entry: Entry) {
        self.maybe_sweep();
        self.entries.insert(key.to_owned(), entry);
    }
}

#[derive(Debug)]
struct Entry {
    value: StoredValue,
    deadline: Option<Instant>,
}

#[derive(Debug)]
enum StoredValue {
    Bytes(Vec<u8>),
    Set(HashSet<String>),
}

impl Entry {
    fn is_stale(&self) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= Instant::now())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    /// Creates a new (empty) in-memory store.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(State {
            entries: HashMap::new(),
            last_sweep: Instant::now(),
        })))
    }

    /// `true` if `key` exists and hasn't expired.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.0.lock().await.get_if_fresh(key).is_some()
    }

    /// The remaining time-to-live for `key`.
    ///
    /// Returns `None` if the key doesn't exist or if it never expires.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut guard = self.0.lock().await;
        let deadline = guard.get_if_fresh(key)?.deadline?;
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    /// The number of live keys in the store.
    pub async fn len(&self) -> usize {
        let guard = self.0.lock().await;
        guard.entries.values().filter(|entry| !entry.is_stale()).count()
    }

    /// `true` if there are no live keys in the store.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Delete expired keys from the store, returning how many were removed.
    ///
    /// If `batch_size` is set, at most `batch_size` keys are removed.
    #[tracing::instrument(name = "Delete expired keys", level = tracing::Level::TRACE, skip_all)]
    pub async fn delete_expired(&self, batch_size: Option<NonZeroUsize>) -> usize {
        let mut guard = self.0.lock().await;
        let mut stale_keys = Vec::new();
        for (key, entry) in guard.entries.iter() {
            if entry.is_stale() {
                stale_keys.push(key.clone());
                if let Some(batch_size) = batch_size {
                    if stale_keys.len() >= batch_size.get() {
                        break;
                    }
                }
            }
        }
        let num_deleted = stale_keys.len();
        for key in stale_keys {
            guard.entries.remove(&key);
        }
        num_deleted
    }
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::Other(anyhow::anyhow!(
        "WRONGTYPE: the value stored at `{key}` has the wrong type for this operation"
    ))
}

#[async_trait::async_trait]
impl SessionStorageBackend for InMemorySessionStore {
    #[tracing::instrument(name = "Get key", level = tracing::Level::TRACE, skip_all)]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut guard = self.0.lock().await;
        match guard.get_if_fresh(key) {
            None => Ok(None),
            Some(Entry {
                value: StoredValue::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    #[tracing::instrument(name = "Set key", level = tracing::Level::TRACE, skip_all)]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        let mut guard = self.0.lock().await;
        guard.insert(
            key,
            Entry {
                value: StoredValue::Bytes(value.to_vec()),
                deadline: None,
            },
        );
        Ok(())
    }

    #[tracing::instrument(name = "Set key with TTL", level = tracing::Level::TRACE, skip_all)]
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), BackendError> {
        let mut guard = self.0.lock().await;
        // A deadline past the end of the clock's range is no deadline at all.
        guard.insert(
            key,
            Entry {
                value: StoredValue::Bytes(value.to_vec()),
                deadline: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    #[tracing::instrument(name = "Delete key", level = tracing::Level::TRACE, skip_all)]
    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut guard = self.0.lock().await;
        guard.entries.remove(key);
        Ok(())
    }

    #[tracing::instrument(name = "Add set member", level = tracing::Level::TRACE, skip_all)]
    async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut guard = self.0.lock().await;
        match guard.get_if_fresh(key) {
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => {
                members.insert(member.to_owned());
            }
            Some(_) => return Err(wrong_type(key)),
            None => {
                guard.insert(
                    key,
                    Entry {
                        value: StoredValue::Set(HashSet::from([member.to_owned()])),
                        deadline: None,
                    },
                );
            }
        }
        Ok(())
    }

    #[tracing::instrument(name = "Remove set member", level = tracing::Level::TRACE, skip_all)]
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut guard = self.0.lock().await;
        let now_empty = match guard.get_if_fresh(key) {
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
            None => false,
        };
        // Like Redis, an empty set is no set at all.
        if now_empty {
            guard.entries.remove(key);
        }
        Ok(())
    }

    #[tracing::instrument(name = "Get set members", level = tracing::Level::TRACE, skip_all)]
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError> {
        let mut guard = self.0.lock().await;
        match guard.get_if_fresh(key) {
            None => Ok(HashSet::new()),
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => Ok(members.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }
}

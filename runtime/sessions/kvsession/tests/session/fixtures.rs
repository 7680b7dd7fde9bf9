use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kvsession::store::{SessionStorageBackend, errors::BackendError};
use kvsession::{JsonCodec, KeySpace, SessionCodec, SessionConfig, SessionId, SessionStore};
use kvsession_memory_store::InMemorySessionStore;
use tokio::sync::Mutex;

/// An empty in-memory session store.
pub fn store() -> SessionStore {
    SessionStore::new(InMemorySessionStore::default())
}

/// An empty in-memory session store, together with a handle to
/// inspect the underlying backend (e.g. its TTLs).
pub fn inspectable_store() -> (SessionStore, InMemorySessionStore) {
    let backend = InMemorySessionStore::default();
    (SessionStore::new(backend.clone()), backend)
}

/// An empty in-memory session store, with a mechanism to inspect
/// what calls were made to it.
pub fn spy_store() -> (SessionStore, CallTracker) {
    let backend = InMemorySessionStore::default();
    let spy_backend = SpyBackend::new(backend);
    let call_tracker = spy_backend.call_tracker();
    (SessionStore::new(spy_backend), call_tracker)
}

/// An empty in-memory session store that can be instructed to fail
/// specific operations.
pub fn faulty_store() -> (SessionStore, InMemorySessionStore, FaultSwitch) {
    let backend = InMemorySessionStore::default();
    let switch = FaultSwitch::default();
    let faulty = FaultyBackend {
        backend: backend.clone(),
        switch: switch.clone(),
    };
    (SessionStore::new(faulty), backend, switch)
}

/// A helper to set up a pre-existing session record.
pub struct SessionFixture {
    pub id: SessionId,
    pub state: serde_json::Value,
    /// If `None`, it'll be defaulted to a value that's high enough
    /// to avoid expiration while we run the test suite.
    pub ttl: Option<Duration>,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self {
            id: SessionId::random(),
            state: serde_json::json!({ "a key": "a value" }),
            ttl: None,
        }
    }
}

impl SessionFixture {
    /// A pre-existing session that belongs to `user_id`, correctly indexed.
    pub fn logged_in(user_id: &str) -> Self {
        Self {
            state: serde_json::json!({ "user_id": user_id }),
            ..Default::default()
        }
    }

    /// Write the session record (and, if there's a user id, the index entry)
    /// using the default key layout.
    pub async fn setup(&self, store: &SessionStore) -> SessionId {
        let keys = KeySpace::new(SessionConfig::default().prefix);
        let bytes = JsonCodec.encode(&self.state).unwrap();
        let ttl = self.ttl.unwrap_or_else(|| Duration::from_secs(1000));
        store
            .set_with_ttl(&keys.session(&self.id), &bytes, ttl)
            .await
            .expect("Failed to create the session record for the fixture");
        if let Some(user_id) = self.state.get("user_id").and_then(|v| v.as_str()) {
            store
                .set_add(&keys.user(user_id), self.id.as_str())
                .await
                .expect("Failed to index the session for the fixture");
        }
        self.id.clone()
    }
}

/// A wrapper that keeps track of which methods have been called
/// on the underlying session storage backend.
#[derive(Debug)]
pub struct SpyBackend<B> {
    backend: B,
    call_tracker: CallTracker,
}

impl<B> SpyBackend<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            call_tracker: Default::default(),
        }
    }

    pub fn call_tracker(&self) -> CallTracker {
        self.call_tracker.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallTracker(Arc<Mutex<Vec<String>>>);

impl CallTracker {
    pub async fn assert_store_was_untouched(&self) {
        let oplog = self.0.lock().await;
        assert!(
            oplog.is_empty(),
            "Server store was supposed to be untouched, but at least one method has been called on it. Operation log:\n  - {}",
            oplog.join("\n  - ")
        )
    }

    pub async fn operation_log(&self) -> Vec<String> {
        self.0.lock().await.clone()
    }

    pub async fn reset_operation_log(&self) {
        self.0.lock().await.clear();
    }

    async fn push_operation(&self, op: impl Into<String>) {
        self.0.lock().await.push(op.into());
    }
}

#[async_trait::async_trait]
impl<B: SessionStorageBackend> SessionStorageBackend for SpyBackend<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.call_tracker.push_operation(format!("get {key}")).await;
        self.backend.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.call_tracker.push_operation(format!("set {key}")).await;
        self.backend.set(key, value).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), BackendError> {
        self.call_tracker
            .push_operation(format!("setex {key} {}", ttl.as_secs()))
            .await;
        self.backend.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.call_tracker.push_operation(format!("del {key}")).await;
        self.backend.delete(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.call_tracker
            .push_operation(format!("sadd {key} {member}"))
            .await;
        self.backend.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.call_tracker
            .push_operation(format!("srem {key} {member}"))
            .await;
        self.backend.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError> {
        self.call_tracker
            .push_operation(format!("smembers {key}"))
            .await;
        self.backend.set_members(key).await
    }
}

/// Which operations should fail.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<Mutex<HashSet<&'static str>>>);

impl FaultSwitch {
    /// Make every call to `operation` fail with a connection error.
    pub async fn fail(&self, operation: &'static str) {
        self.0.lock().await.insert(operation);
    }

    /// Stop failing calls to `operation`.
    pub async fn heal(&self, operation: &'static str) {
        self.0.lock().await.remove(operation);
    }

    async fn check(&self, operation: &'static str) -> Result<(), BackendError> {
        if self.0.lock().await.contains(operation) {
            Err(BackendError::Connection(anyhow::anyhow!(
                "Connection reset by peer while executing `{operation}`"
            )))
        } else {
            Ok(())
        }
    }
}

/// A backend that fails the operations it has been told to fail.
#[derive(Debug)]
pub struct FaultyBackend<B> {
    backend: B,
    switch: FaultSwitch,
}

#[async_trait::async_trait]
impl<B: SessionStorageBackend> SessionStorageBackend for FaultyBackend<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.switch.check("get").await?;
        self.backend.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.switch.check("set").await?;
        self.backend.set(key, value).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), BackendError> {
        self.switch.check("setex").await?;
        self.backend.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.switch.check("del").await?;
        self.backend.delete(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.switch.check("sadd").await?;
        self.backend.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.switch.check("srem").await?;
        self.backend.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError> {
        self.switch.check("smembers").await?;
        self.backend.set_members(key).await
    }
}

use errors::BackendError;
use std::{collections::HashSet, sync::Arc};

/// Where session records, client fingerprints and user indexes are stored.
///
/// It is a thin, cheaply clonable wrapper
/// [around your chosen storage backend implementation][`SessionStorageBackend`],
/// removing the need to specify the concrete type of the storage backend
/// everywhere in your code.
/// Clones share the same underlying backend (and, therefore, the same connection pool).
#[derive(Debug, Clone)]
pub struct SessionStore(Arc<dyn SessionStorageBackend>);

impl SessionStore {
    /// Creates a new session store using the provided backend.
    pub fn new<Backend>(backend: Backend) -> Self
    where
        Backend: SessionStorageBackend + 'static,
    {
        Self(Arc::new(backend))
    }

    /// Retrieve the value stored at `key`, if any.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.0.get(key).await
    }

    /// Store `value` at `key`, without an expiration.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.0.set(key, value).await
    }

    /// Store `value` at `key`, letting the backend expire it after `ttl`.
    pub async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: std::time::Duration,
    ) -> Result<(), BackendError> {
        self.0.set_with_ttl(key, value, ttl).await
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.0.delete(key).await
    }

    /// Add `member` to the set stored at `key`.
    pub async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.0.set_add(key, member).await
    }

    /// Remove `member` from the set stored at `key`.
    pub async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        self.0.set_remove(key, member).await
    }

    /// All the members of the set stored at `key`.
    ///
    /// A missing key is treated as an empty set.
    pub async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError> {
        self.0.set_members(key).await
    }
}

#[async_trait::async_trait]
/// The interface of a session storage backend.
///
/// The session subsystem only needs a handful of key-value and set primitives.
/// Each call is expected to be atomic on its own, but no atomicity is assumed
/// _across_ calls.
///
/// Implementations are responsible for timeouts and retries, if any:
/// errors are propagated as-is to the caller.
pub trait SessionStorageBackend: std::fmt::Debug + Send + Sync {
    /// Retrieve the value stored at `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store `value` at `key` without an expiration, overwriting any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Store `value` at `key`, overwriting any previous value.
    /// The key must expire after `ttl`.
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: std::time::Duration,
    ) -> Result<(), BackendError>;

    /// Delete `key`, if it exists.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Add `member` to the set stored at `key`, creating the set if needed.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError>;

    /// Remove `member` from the set stored at `key`.
    ///
    /// Removing from a missing set, or removing a missing member, is not an error.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError>;

    /// Retrieve all the members of the set stored at `key`.
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError>;
}

/// Errors that can occur when interacting with a session storage backend.
pub mod errors {
    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by all [`SessionStorageBackend`][super::SessionStorageBackend] operations.
    pub enum BackendError {
        /// The backend couldn't be reached, or the connection was dropped mid-request.
        #[error("Failed to reach the session storage backend.")]
        Connection(#[source] anyhow::Error),
        /// The backend didn't reply in time.
        #[error("The session storage backend didn't reply in time.")]
        Timeout(#[source] anyhow::Error),
        /// Something else went wrong when talking to the backend.
        #[error("Something went wrong when interacting with the session storage backend.")]
        Other(#[source] anyhow::Error),
    }
}

//! A storage backend for `kvsession` using Redis (or a Redis-compatible database, e.g. Valkey).
use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use kvsession::store::{SessionStorageBackend, errors::BackendError};
use redis::{
    AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError,
    aio::ConnectionManager,
};

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Where to find the Redis server.
pub struct RedisSessionStoreConfig {
    /// Defaults to `localhost`.
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to `6379`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The logical database to select. Defaults to `0`.
    #[serde(default)]
    pub database: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for RedisSessionStoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: 0,
            username: None,
            password: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

impl RedisSessionStoreConfig {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.database,
                username: self.username.clone(),
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

#[derive(Clone)]
/// A storage backend for server-side sessions, using Redis.
///
/// # Implementation details
///
/// Every trait method maps to a single Redis command:
/// `GET`, `SET`, `SET .. EX`, `DEL`, `SADD`, `SREM` and `SMEMBERS`.
/// Expiration is delegated to Redis.
///
/// The underlying [`ConnectionManager`] reconnects transparently and is cheap to clone:
/// a clone is used for every command.
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisSessionStore {
    /// Creates a new Redis session store on top of an existing connection.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the Redis server described by `config`.
    #[tracing::instrument(name = "Connect to Redis", level = tracing::Level::INFO, skip_all)]
    pub async fn connect(config: &RedisSessionStoreConfig) -> Result<Self, BackendError> {
        let client = redis::Client::open(config.connection_info())
            .context("Invalid Redis connection parameters")
            .map_err(BackendError::Other)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(classify_error)?;
        tracing::info!(
            redis.host = %config.host,
            redis.port = config.port,
            redis.database = config.database,
            "Connected to Redis"
        );
        Ok(Self::new(conn))
    }
}

/// Map a Redis error onto the backend error taxonomy.
fn classify_error(e: RedisError) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.into())
    } else if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
        BackendError::Connection(e.into())
    } else {
        BackendError::Other(e.into())
    }
}

/// Redis rejects a zero expiration and only has second granularity.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[async_trait::async_trait]
impl SessionStorageBackend for RedisSessionStore {
    #[tracing::instrument(name = "Redis GET", level = tracing::Level::TRACE, skip_all)]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.conn.clone().get(key).await.map_err(classify_error)
    }

    #[tracing::instrument(name = "Redis SET", level = tracing::Level::TRACE, skip_all)]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.conn
            .clone()
            .set::<_, _, ()>(key, value)
            .await
            .map_err(classify_error)
    }

    #[tracing::instrument(name = "Redis SETEX", level = tracing::Level::TRACE, skip_all)]
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), BackendError> {
        self.conn
            .clone()
            .set_ex::<_, _, ()>(key, value, ttl_seconds(ttl))
            .await
            .map_err(classify_error)
    }

    #[tracing::instrument(name = "Redis DEL", level = tracing::Level::TRACE, skip_all)]
    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        // The number of deleted keys doesn't matter: deleting a missing key is fine.
        let _deleted: u64 = self.conn.clone().del(key).await.map_err(classify_error)?;
        Ok(())
    }

    #[tracing::instrument(name = "Redis SADD", level = tracing::Level::TRACE, skip_all)]
    async fn set_add(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let _added: u64 = self
            .conn
            .clone()
            .sadd(key, member)
            .await
            .map_err(classify_error)?;
        Ok(())
    }

    #[tracing::instrument(name = "Redis SREM", level = tracing::Level::TRACE, skip_all)]
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let _removed: u64 = self
            .conn
            .clone()
            .srem(key, member)
            .await
            .map_err(classify_error)?;
        Ok(())
    }

    #[tracing::instrument(name = "Redis SMEMBERS", level = tracing::Level::TRACE, skip_all)]
    async fn set_members(&self, key: &str) -> Result<HashSet<String>, BackendError> {
        self.conn
            .clone()
            .smembers(key)
            .await
            .map_err(classify_error)
    }
}

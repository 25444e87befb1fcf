//! Session persistence over a key-value contract.
//!
//! Redis is the durable backend. When it cannot be reached at startup the store drops to a
//! process-local map for the rest of the process lifetime (no TTL, no eviction).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::ConversationSession;
use crate::config::SessionConfig;

/// Minimal key-value contract a session backend must satisfy.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn ping(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect and ping, giving up after `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("Invalid redis url {}", url))?;
        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow!("Redis connect to {} timed out after {:?}", url, timeout))?
            .context("Redis connection failed")?;

        let backend = Self { manager };
        tokio::time::timeout(timeout, backend.ping())
            .await
            .map_err(|_| anyhow!("Redis ping timed out after {:?}", timeout))??;
        Ok(backend)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL").arg(key).query_async::<_, i64>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let pong = redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        if pong != "PONG" {
            return Err(anyhow!("Unexpected PING reply: {}", pong));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// ============================================================================
// In-process fallback
// ============================================================================

/// Process-lifetime map. TTLs are accepted and ignored.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Session store
// ============================================================================

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Session-level persistence. Failures and timeouts are logged and reported as "absent" /
/// `false`, never raised to the caller.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KvBackend>,
    ttl_secs: u64,
    key_prefix: String,
    op_timeout: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KvBackend>, ttl_secs: u64, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            ttl_secs,
            key_prefix: key_prefix.into(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Process-local store, used directly by tests and as the degraded mode.
    pub fn in_memory() -> Self {
        let defaults = SessionConfig::default();
        Self::new(Arc::new(InMemoryBackend::new()), defaults.ttl_secs, defaults.key_prefix)
    }

    /// Connect to Redis, or fall back to memory for the rest of the process if that fails.
    pub async fn connect(config: &SessionConfig) -> Self {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let backend: Arc<dyn KvBackend> = match RedisBackend::connect(&config.redis_url, timeout).await {
            Ok(redis) => {
                tracing::info!(url = %config.redis_url, "Session store: Redis connected");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis connection failed, using in-memory session storage");
                Arc::new(InMemoryBackend::new())
            }
        };
        Self::new(backend, config.ttl_secs, config.key_prefix.clone())
            .with_op_timeout(Duration::from_secs(config.op_timeout_secs))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    /// Run one backend call under the per-operation timeout.
    async fn bounded<T>(&self, op: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.op_timeout, call).await.map_err(|_| {
            anyhow!(
                "{} on {} backend timed out after {:?}",
                op,
                self.backend.name(),
                self.op_timeout
            )
        })?
    }

    pub async fn get(&self, session_id: &str) -> Option<ConversationSession> {
        let key = self.key(session_id);
        let raw = match self.bounded("GET", self.backend.get(&key)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::error!(session_id, error = %e, "Error retrieving session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(session_id, error = %e, "Stored session is not decodable, treating as absent");
                None
            }
        }
    }

    /// Refreshes `last_activity` and the TTL. Returns `false` if nothing was written.
    pub async fn save(&self, session: &mut ConversationSession) -> bool {
        session.last_activity = chrono::Utc::now();

        let data = match serde_json::to_string(session) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, error = %e, "Session serialization failed");
                return false;
            }
        };

        let key = self.key(&session.session_id);
        match self
            .bounded("SETEX", self.backend.set_with_ttl(&key, &data, self.ttl_secs))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, error = %e, "Error saving session");
                false
            }
        }
    }

    pub async fn delete(&self, session_id: &str) -> bool {
        let key = self.key(session_id);
        match self.bounded("DEL", self.backend.delete(&key)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session_id, error = %e, "Error deleting session");
                false
            }
        }
    }
}

//! Result cache with a primary backend and an in-process fallback.
//!
//! The primary backend is pinged once at construction. When it is
//! unreachable, or when any later call to it fails, operations quietly use
//! the fallback map instead. Callers never see a cache error: a failed read
//! is a miss and a failed write lands in the fallback.
//!
//! Keys are flat strings namespaced by domain, e.g. `code_analysis:<sha256>`.
//! Agent message logs are JSON arrays under `agent:<id>:messages`.

mod backend;
mod memory;

pub use backend::{CacheBackend, FileBackend};
pub use memory::FallbackMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Errors reported by cache backends. Never surfaced past `CacheStore`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Logical domains sharing one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Repository / codebase analysis, keyed by repository URL or path
    Analysis,
    /// Single code sample analysis, keyed by fingerprint
    CodeAnalysis,
    WebTest,
    UserPrefs,
    TaskStatus,
    /// Append-only message log per agent; never expires
    AgentMessages,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Analysis => "analysis",
            Namespace::CodeAnalysis => "code_analysis",
            Namespace::WebTest => "web_test",
            Namespace::UserPrefs => "user_prefs",
            Namespace::TaskStatus => "task",
            Namespace::AgentMessages => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis" => Some(Namespace::Analysis),
            "code_analysis" => Some(Namespace::CodeAnalysis),
            "web_test" => Some(Namespace::WebTest),
            "user_prefs" => Some(Namespace::UserPrefs),
            "task" | "task_status" => Some(Namespace::TaskStatus),
            "agent" | "agent_messages" => Some(Namespace::AgentMessages),
            _ => None,
        }
    }

    /// Full cache key for an identifier in this namespace.
    pub fn key(&self, id: &str) -> String {
        match self {
            Namespace::TaskStatus => format!("task:{}:status", id),
            Namespace::AgentMessages => format!("agent:{}:messages", id),
            other => format!("{}:{}", other.prefix(), id),
        }
    }

    /// Whether stored objects get a `timestamp` field added.
    fn injects_timestamp(&self) -> bool {
        !matches!(self, Namespace::UserPrefs)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Expiration per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub analysis: Duration,
    pub code_analysis: Duration,
    pub web_test: Duration,
    pub user_prefs: Duration,
    pub task_status: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            analysis: Duration::from_secs(3600),
            code_analysis: Duration::from_secs(3600),
            web_test: Duration::from_secs(3600),
            user_prefs: Duration::from_secs(86400),
            task_status: Duration::from_secs(7200),
        }
    }
}

impl TtlPolicy {
    /// Expiry for entries in `namespace`; `None` means they persist.
    pub fn for_namespace(&self, namespace: Namespace) -> Option<Duration> {
        match namespace {
            Namespace::Analysis => Some(self.analysis),
            Namespace::CodeAnalysis => Some(self.code_analysis),
            Namespace::WebTest => Some(self.web_test),
            Namespace::UserPrefs => Some(self.user_prefs),
            Namespace::TaskStatus => Some(self.task_status),
            Namespace::AgentMessages => None,
        }
    }
}

/// Where a write ended up. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Primary,
    Fallback,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fallback_hits: u64,
    pub fallback_writes: u64,
    pub primary_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fallback_hits: AtomicU64,
    fallback_writes: AtomicU64,
    primary_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cache with graceful degradation to an in-process map.
pub struct CacheStore {
    primary: Option<Arc<dyn CacheBackend>>,
    fallback: FallbackMap,
    ttl: TtlPolicy,
    counters: Counters,
    /// Serializes read-modify-write of message logs.
    message_log: Mutex<()>,
}

impl CacheStore {
    /// Ping `backend` once and build a store around it.
    ///
    /// An unreachable backend is logged here and never contacted again.
    pub async fn connect(backend: Arc<dyn CacheBackend>, ttl: TtlPolicy) -> Self {
        let primary = if backend.ping().await {
            info!(backend = backend.name(), "cache backend connected");
            Some(backend)
        } else {
            error!(
                backend = backend.name(),
                "cache backend unreachable, using in-memory fallback"
            );
            None
        };

        Self {
            primary,
            fallback: FallbackMap::new(),
            ttl,
            counters: Counters::default(),
            message_log: Mutex::new(()),
        }
    }

    /// Store backed only by the fallback map.
    pub fn in_memory(ttl: TtlPolicy) -> Self {
        Self {
            primary: None,
            fallback: FallbackMap::new(),
            ttl,
            counters: Counters::default(),
            message_log: Mutex::new(()),
        }
    }

    pub fn is_primary_available(&self) -> bool {
        self.primary.is_some()
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            fallback_hits: c.fallback_hits.load(Ordering::Relaxed),
            fallback_writes: c.fallback_writes.load(Ordering::Relaxed),
            primary_errors: c.primary_errors.load(Ordering::Relaxed),
        }
    }

    /// Look up `key`: primary first, then the fallback map.
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(Some(value)) => {
                    Counters::bump(&self.counters.hits);
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => {
                    Counters::bump(&self.counters.primary_errors);
                    debug!(key, error = %e, "cache read failed, trying fallback");
                }
            }
        }

        match self.fallback.get(key) {
            Some(value) => {
                Counters::bump(&self.counters.hits);
                Counters::bump(&self.counters.fallback_hits);
                Some(value)
            }
            None => {
                Counters::bump(&self.counters.misses);
                None
            }
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Writes the primary when reachable, otherwise the fallback map. Never
    /// fails; the returned tier says where the value went. At most one tier
    /// holds a live entry for `key` afterwards.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheTier {
        if let Some(primary) = &self.primary {
            match primary.set(key, value, ttl.map(|ttl| ttl.as_secs())).await {
                Ok(()) => {
                    self.fallback.remove(key);
                    return CacheTier::Primary;
                }
                Err(e) => {
                    Counters::bump(&self.counters.primary_errors);
                    warn!(key, error = %e, "cache write failed, storing in fallback");
                    // An older primary copy would shadow the fallback on reads.
                    if let Err(e) = primary.delete(key).await {
                        Counters::bump(&self.counters.primary_errors);
                        debug!(key, error = %e, "cannot clear stale primary entry");
                    }
                }
            }
        }

        self.fallback.set(key, value, ttl);
        Counters::bump(&self.counters.fallback_writes);
        CacheTier::Fallback
    }

    /// Remove `key` from both tiers. Returns whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut removed = false;
        if let Some(primary) = &self.primary {
            match primary.delete(key).await {
                Ok(existed) => removed |= existed,
                Err(e) => {
                    Counters::bump(&self.counters.primary_errors);
                    debug!(key, error = %e, "cache delete failed");
                }
            }
        }
        removed |= self.fallback.remove(key);
        removed
    }

    /// Whether a live entry exists for `key` in either tier.
    pub async fn exists(&self, key: &str) -> bool {
        if let Some(primary) = &self.primary {
            match primary.exists(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    Counters::bump(&self.counters.primary_errors);
                    debug!(key, error = %e, "cache existence check failed");
                }
            }
        }
        self.fallback.contains(key)
    }

    /// Serialize and store `value` under `namespace:id` with the namespace TTL.
    ///
    /// JSON objects get a `timestamp` field unless they already carry one
    /// (user preferences are stored as given). Returns `None` only if the
    /// value cannot be serialized.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        namespace: Namespace,
        id: &str,
        value: &T,
    ) -> Option<CacheTier> {
        let mut json = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(namespace = %namespace, id, error = %e, "cannot serialize cache value");
                return None;
            }
        };

        if namespace.injects_timestamp() {
            if let Value::Object(map) = &mut json {
                map.entry("timestamp")
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            }
        }

        let ttl = self.ttl.for_namespace(namespace);
        Some(self.set(&namespace.key(id), &json.to_string(), ttl).await)
    }

    /// Fetch and deserialize `namespace:id`.
    ///
    /// A stored value that no longer deserializes is treated as a miss.
    pub async fn fetch<T: DeserializeOwned>(&self, namespace: Namespace, id: &str) -> Option<T> {
        let key = namespace.key(id);
        let raw = self.get(&key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Remove `namespace:id`.
    pub async fn remove(&self, namespace: Namespace, id: &str) -> bool {
        self.delete(&namespace.key(id)).await
    }

    /// Append `message` to the log of `agent_id`, adding a `timestamp` to
    /// JSON objects that lack one. Returns `None` if it cannot be serialized.
    pub async fn push_agent_message<T: Serialize + ?Sized>(
        &self,
        agent_id: &str,
        message: &T,
    ) -> Option<CacheTier> {
        let mut json = match serde_json::to_value(message) {
            Ok(v) => v,
            Err(e) => {
                warn!(agent_id, error = %e, "cannot serialize agent message");
                return None;
            }
        };
        if let Value::Object(map) = &mut json {
            map.entry("timestamp")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }

        let key = Namespace::AgentMessages.key(agent_id);
        let _guard = self.message_log.lock().await;
        let mut log = self.read_message_log(&key).await;
        log.push(json);
        let encoded = Value::Array(log).to_string();
        Some(self.set(&key, &encoded, None).await)
    }

    /// Messages of `agent_id` in insertion order. Empty when none are stored.
    pub async fn agent_messages(&self, agent_id: &str) -> Vec<Value> {
        self.read_message_log(&Namespace::AgentMessages.key(agent_id))
            .await
    }

    /// Drop the message log of `agent_id`.
    pub async fn clear_agent_messages(&self, agent_id: &str) -> bool {
        let _guard = self.message_log.lock().await;
        self.remove(Namespace::AgentMessages, agent_id).await
    }

    async fn read_message_log(&self, key: &str) -> Vec<Value> {
        let Some(raw) = self.get(key).await else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Array(items)) => items,
            _ => {
                debug!(key, "discarding malformed agent message log");
                Vec::new()
            }
        }
    }
}

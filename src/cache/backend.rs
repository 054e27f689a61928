//! Primary cache backends.
//!
//! `CacheBackend` is the seam for the external key-value store. The bundled
//! `FileBackend` keeps one JSON envelope per key under the user cache
//! directory (~/.cache/autoreview/store on Linux).

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::CacheError;

/// Key-value store contract used by `CacheStore`.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` with an optional expiry in seconds, replacing any
    /// previous value. Value and expiry land together or not at all.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Backend name, for logging.
    fn name(&self) -> &str;
}

/// On-disk envelope for one key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    expires_at: Option<u64>,
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// Distinguishes temporary files of concurrent writers in one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// File-per-key backend.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Backend in the platform cache directory, if one can be determined.
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("", "", "autoreview").map(|dirs| Self::new(dirs.cache_dir().join("store")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a key. Keys are hashed since they contain URLs.
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, CacheError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_str(&content)?;

        if entry.key != key {
            // Hash collision or foreign file; treat as a miss.
            return Ok(None);
        }
        if entry.is_expired(current_timestamp()) {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Write via a temporary file and rename, so readers never see a
    /// partially written entry. Each write gets its own temporary file.
    async fn write_entry(&self, entry: &StoredEntry) -> Result<(), CacheError> {
        let path = self.path_for(&entry.key);
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        let content = serde_json::to_string(entry)?;
        if let Err(e) = tokio::fs::write(&tmp, content).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn ping(&self) -> bool {
        if tokio::fs::create_dir_all(&self.dir).await.is_err() {
            return false;
        }
        let marker = self.dir.join(".ping");
        let ok = tokio::fs::write(&marker, b"pong").await.is_ok();
        let _ = tokio::fs::remove_file(&marker).await;
        ok
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read_entry(key).await?.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        self.write_entry(&StoredEntry {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: ttl_secs.map(|secs| current_timestamp().saturating_add(secs)),
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.read_entry(key).await?.is_some();
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(existed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Get current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

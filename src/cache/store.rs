//! File-backed store with write-behind persistence
//!
//! One file per cache key under `<base_dir>/<namespace>/`. The file's
//! modification time is the freshness clock. Writes are fire-and-forget:
//! the payload lands in the memory mirror synchronously and is persisted
//! to disk on a spawned task, so a reader immediately after a write may
//! race the persist and observe a stale or absent file. That race is part
//! of the write-behind contract, not a defect.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::CacheError;
use super::key::CacheKey;

/// Maximum number of entries mirrored in memory
const MIRROR_CAPACITY: u64 = 64;

/// Handle to an in-flight write-behind persist
///
/// Production callers drop it; tests await it to observe durability.
pub struct WriteReceipt {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl WriteReceipt {
    fn noop() -> Self {
        Self { handle: None }
    }

    /// Wait until the backing write has finished (successfully or not)
    pub async fn settled(self) {
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

/// File-backed cache store scoped to one namespace directory
pub struct FileStore {
    root: PathBuf,
    mirror: Cache<String, Bytes>,
}

impl FileStore {
    /// Open a store rooted at `<base_dir>/<namespace>/`.
    ///
    /// The directory is created lazily on the first write; a store over a
    /// missing directory simply reports every key as absent.
    pub fn open(base_dir: impl Into<PathBuf>, namespace: &str) -> Self {
        Self {
            root: base_dir.into().join(namespace),
            mirror: Cache::builder().max_capacity(MIRROR_CAPACITY).build(),
        }
    }

    /// The namespace directory backing this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolved file path for a key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Whether an entry exists for `key`, in the mirror or on disk
    pub fn exists(&self, key: &CacheKey) -> bool {
        let path = self.path_for(key);
        self.mirror.contains_key(&path_key(&path)) || path.is_file()
    }

    /// Whether the entry's last write is within `ttl` of now.
    ///
    /// Derived from file mtime only; a zero TTL is always stale. An entry
    /// that exists only in the mirror (persist still in flight) reports
    /// stale, which at worst costs one live fetch.
    pub fn is_fresh(&self, key: &CacheKey, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return false;
        }

        let modified = match std::fs::metadata(self.path_for(key)).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return false,
        };

        match SystemTime::now().duration_since(modified) {
            Ok(age) => age <= ttl,
            // mtime in the future: treat as just written
            Err(_) => true,
        }
    }

    /// Read and deserialize the entry for `key`.
    ///
    /// Consults the memory mirror before touching the disk. Returns
    /// `CacheError::NotFound` when no entry exists and
    /// `CacheError::Serialization` when the stored bytes don't match the
    /// requested shape.
    pub async fn read<P: DeserializeOwned>(&self, key: &CacheKey) -> Result<P, CacheError> {
        let path = self.path_for(key);
        let path_key = path_key(&path);

        let bytes = match self.mirror.get(&path_key) {
            Some(bytes) => bytes,
            None => {
                let data = tokio::fs::read(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        CacheError::NotFound
                    } else {
                        CacheError::Io(e)
                    }
                })?;
                let bytes = Bytes::from(data);
                self.mirror.insert(path_key, bytes.clone());
                bytes
            }
        };

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist `payload` under `key` without blocking the caller.
    ///
    /// The memory mirror is updated synchronously; the disk write runs on
    /// its own task. Failures are logged and never surfaced to the caller:
    /// a lost write only means a future request re-fetches. Concurrent
    /// writers to the same key are not serialized; the last write wins.
    pub fn write_behind<P: Serialize>(&self, key: &CacheKey, payload: &P) -> WriteReceipt {
        let bytes = match serde_json::to_vec(payload) {
            Ok(encoded) => Bytes::from(encoded),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to encode payload for cache");
                return WriteReceipt::noop();
            }
        };

        let path = self.path_for(key);
        self.mirror.insert(path_key(&path), bytes.clone());

        let root = self.root.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = persist(&root, &path, bytes).await {
                tracing::warn!(path = %path.display(), error = %e, "cache write-behind failed");
            }
        });

        WriteReceipt {
            handle: Some(handle),
        }
    }

    /// Delete every entry in the namespace directory.
    ///
    /// Returns the number of files removed. A missing directory counts as
    /// already clear. May race an in-flight write-behind to the same key;
    /// the last writer wins.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        self.mirror.invalidate_all();

        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            if tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete entries whose type tag matches and whose last write is older
    /// than `older_than`.
    ///
    /// Returns the number of files removed.
    pub async fn clear_matching(
        &self,
        type_tags: &[&str],
        older_than: SystemTime,
    ) -> Result<usize, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !type_tags.iter().any(|tag| name.starts_with(tag)) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(_) => continue,
            };
            if modified >= older_than {
                continue;
            }

            let path = entry.path();
            if tokio::fs::remove_file(&path).await.is_ok() {
                self.mirror.invalidate(&path_key(&path));
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Write to a temp file, then atomically rename over the destination
async fn persist(root: &Path, path: &Path, bytes: Bytes) -> std::io::Result<()> {
    tokio::fs::create_dir_all(root).await?;

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &bytes).await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

//! Filesystem-backed content cache
//!
//! Layout: one file per key named `<key>_cache.text` holding the raw value
//! with no framing. The file's modification time is the only staleness
//! signal. Writes go to a temporary sibling first and are renamed into
//! place, so readers never observe a half-written value.

use crate::{CacheError, KeyValueCache};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const FILE_SUFFIX: &str = "_cache.text";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content cache stored as plain files in one directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    validity: Duration,
}

impl FileCache {
    /// Open (creating if needed) a cache directory
    pub fn new(dir: impl Into<PathBuf>, validity: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, validity })
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configured validity window
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Path of the file holding `key`
    ///
    /// Keys must be non-empty and made of ASCII letters, digits, `-` or `_`
    /// so they can never escape the cache directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}{}", key, FILE_SUFFIX)))
    }

    /// Last write time of the entry for `key`, if the file exists
    pub async fn written_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_fresh(&self, written_at: DateTime<Utc>) -> bool {
        // clock skew can put mtime in the future; treat that as just written
        let age = Utc::now()
            .signed_duration_since(written_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < self.validity
    }
}

#[async_trait::async_trait]
impl KeyValueCache for FileCache {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(written_at) = self.written_at(key).await? else {
            return Ok(None);
        };

        if !self.is_fresh(written_at) {
            debug!(key, %written_at, "cache entry is stale");
            return Ok(None);
        }

        match tokio::fs::read_to_string(self.path_for(key)?).await {
            Ok(text) => Ok(Some(text)),
            // invalidated between the metadata check and the read
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let temp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&temp, value).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key, path = %path.display(), bytes = value.len(), "cache entry written");
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! Enriched-DDL cache
//!
//! Maps a DDL fingerprint (SHA-256 of the raw DDL text) to the commented DDL
//! a language model produced for it, so identical schemas are only enriched
//! once per validity window.
//!
//! ## Architecture
//!
//! - **[`KeyValueCache`]**: the capability the orchestrator consumes
//! - **[`ContentCache`]**: in-process map with lazy expiry
//! - **[`FileCache`]**: one `<fingerprint>_cache.text` file per entry, staleness from mtime
//!
//! Entries are never swept in the background; a stale entry simply reads as
//! absent.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use naturalquery_cache::{fingerprint, FileCache, KeyValueCache, DEFAULT_VALIDITY};
//!
//! let cache = FileCache::new("cache_data", DEFAULT_VALIDITY)?;
//! let key = fingerprint(&ddl);
//! if cache.get(&key).await?.is_none() {
//!     cache.put(&key, &enriched).await?;
//! }
//! ```

pub mod fingerprint;
pub mod memory;
pub mod file;

pub use fingerprint::fingerprint;
pub use memory::ContentCache;
pub use file::FileCache;

use std::time::Duration;

/// Default freshness window for cached entries
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors from cache backends
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache key '{0}'")]
    InvalidKey(String),

    /// A writer panicked while holding the in-memory store
    #[error("Cache store lock poisoned")]
    Poisoned,
}

/// Text store keyed by fingerprint with time-based freshness
///
/// `put` overwrites unconditionally, so concurrent writers to one key
/// resolve as last-writer-wins. `get` never mutates.
#[async_trait::async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Fresh value for `key`, or `None` when missing or stale
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry
    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Remove the entry for `key`; absent keys are not an error
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

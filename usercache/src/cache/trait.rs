//! Store trait definition for dependency injection.

use bytes::Bytes;

use super::{BoxFuture, CacheEntry, StoreStats};
use crate::error::CacheError;
use crate::key::CacheKey;

/// Key → artifact storage with a capacity bound and LRU eviction.
///
/// Implementations are shared across all requests. Inserts under the same
/// key are serialized; independent keys may be written concurrently.
///
/// # Example
///
/// ```ignore
/// use usercache::cache::{ArtifactStore, MemoryStore};
///
/// let store = MemoryStore::new(1024 * 1024);
/// if store.lookup(&key).await.is_none() {
///     store.insert(key.clone(), artifact).await?;
/// }
/// ```
pub trait ArtifactStore: Send + Sync {
    /// Fetch an entry without blocking on any generation.
    ///
    /// Absent, corrupt and unreadable entries are all misses. Does not
    /// refresh recency; call [`touch`](Self::touch) for that.
    fn lookup(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>>;

    /// Like [`lookup`](Self::lookup), but not counted as a hit or miss.
    ///
    /// Used for internal re-checks. Defaults to `lookup`.
    fn peek(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>> {
        self.lookup(key)
    }

    /// Store or overwrite an entry, then evict until within capacity.
    fn insert(&self, key: CacheKey, data: Bytes) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Mark an entry as just accessed.
    fn touch(&self, key: &CacheKey) -> BoxFuture<'_, ()>;

    /// Delete one entry. Returns whether it existed.
    fn remove(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Delete every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Total stored bytes.
    fn size_bytes(&self) -> u64;

    fn entry_count(&self) -> u64;

    fn capacity_bytes(&self) -> u64;

    fn stats(&self) -> StoreStats;
}

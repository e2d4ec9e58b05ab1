//! In-memory LRU index for cache entries.
//!
//! Tracks size, creation time and last access for every stored entry so
//! eviction can pick victims without touching the backing storage.
//!
//! # Lifecycle
//!
//! The index is ephemeral. `DiskStore` rebuilds it on open from entry headers
//! (creation time) and file mtimes (last access), then keeps it in sync via
//! `record()`, `touch()` and `remove()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use dashmap::DashMap;

use crate::key::CacheKey;

/// Minimal metadata for cache entry tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Size of the artifact in bytes.
    pub size_bytes: u64,
    /// When the entry was written.
    pub created_at: SystemTime,
    /// Last access (insert or hit).
    pub last_accessed: Instant,
}

/// A candidate entry for eviction.
#[derive(Debug, Clone)]
pub struct EvictionCandidate {
    pub key: CacheKey,
    pub metadata: EntryMetadata,
}

/// Thread-safe in-memory LRU index.
///
/// Uses `DashMap` for concurrent access and `AtomicU64` for size tracking.
#[derive(Debug, Default)]
pub struct LruIndex {
    entries: DashMap<CacheKey, EntryMetadata>,
    total_size: AtomicU64,
    entry_count: AtomicU64,
}

impl LruIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly written entry, replacing any previous one under `key`.
    pub fn record(&self, key: &CacheKey, size: u64) {
        let now = Instant::now();
        self.record_with(
            key,
            EntryMetadata {
                size_bytes: size,
                created_at: SystemTime::now(),
                last_accessed: now,
            },
        );
    }

    /// Record an entry with explicit metadata (used when rebuilding from disk).
    pub fn record_with(&self, key: &CacheKey, metadata: EntryMetadata) {
        let size = metadata.size_bytes;
        if let Some(old) = self.entries.insert(key.clone(), metadata) {
            let old_size = old.size_bytes;
            if size > old_size {
                self.total_size.fetch_add(size - old_size, Ordering::Relaxed);
            } else {
                self.total_size.fetch_sub(old_size - size, Ordering::Relaxed);
            }
        } else {
            self.total_size.fetch_add(size, Ordering::Relaxed);
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Update the access time of an existing entry.
    ///
    /// Returns `false` if the key is not indexed.
    pub fn touch(&self, key: &CacheKey) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.last_accessed = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove an entry, returning its metadata if it was indexed.
    pub fn remove(&self, key: &CacheKey) -> Option<EntryMetadata> {
        let (_, metadata) = self.entries.remove(key)?;
        self.total_size
            .fetch_sub(metadata.size_bytes, Ordering::Relaxed);
        self.entry_count.fetch_sub(1, Ordering::Relaxed);
        Some(metadata)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
        self.total_size.store(0, Ordering::Relaxed);
        self.entry_count.store(0, Ordering::Relaxed);
    }

    /// Entries to evict so the total size drops to `capacity` or below.
    ///
    /// Ordered least recently accessed first; equal access times fall back
    /// to the oldest creation time. Empty when already within capacity.
    pub fn eviction_candidates(&self, capacity: u64) -> Vec<EvictionCandidate> {
        let total = self.total_size();
        if total <= capacity {
            return Vec::new();
        }

        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|entry| EvictionCandidate {
                key: entry.key().clone(),
                metadata: *entry.value(),
            })
            .collect();

        all.sort_by(|a, b| {
            a.metadata
                .last_accessed
                .cmp(&b.metadata.last_accessed)
                .then(a.metadata.created_at.cmp(&b.metadata.created_at))
        });

        let mut excess = total - capacity;
        let mut candidates = Vec::new();
        for candidate in all {
            if excess == 0 {
                break;
            }
            excess = excess.saturating_sub(candidate.metadata.size_bytes);
            candidates.push(candidate);
        }
        candidates
    }

    /// Total size of all tracked entries in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(n: u8) -> CacheKey {
        CacheKey::from_hex(&format!("{:02x}", n).repeat(32)).unwrap()
    }

    #[test]
    fn lru_index_record_updates_total_size() {
        let index = LruIndex::new();

        assert_eq!(index.total_size(), 0);
        assert_eq!(index.entry_count(), 0);

        index.record(&key(1), 1000);
        assert_eq!(index.total_size(), 1000);
        assert_eq!(index.entry_count(), 1);

        index.record(&key(2), 2000);
        assert_eq!(index.total_size(), 3000);
        assert_eq!(index.entry_count(), 2);
    }

    #[test]
    fn lru_index_record_replaces_existing_entry() {
        let index = LruIndex::new();

        index.record(&key(1), 1000);
        index.record(&key(1), 1500);
        assert_eq!(index.total_size(), 1500);
        assert_eq!(index.entry_count(), 1);

        index.record(&key(1), 500);
        assert_eq!(index.total_size(), 500);
        assert_eq!(index.entry_count(), 1);
    }

    #[test]
    fn lru_index_touch_updates_last_accessed() {
        let index = LruIndex::new();
        index.record(&key(1), 1000);
        let before = index.get(&key(1)).unwrap().last_accessed;

        std::thread::sleep(Duration::from_millis(10));
        assert!(index.touch(&key(1)));

        let after = index.get(&key(1)).unwrap().last_accessed;
        assert!(after > before, "touch() should update last_accessed");
    }

    #[test]
    fn lru_index_touch_nonexistent_is_noop() {
        let index = LruIndex::new();
        assert!(!index.touch(&key(9)));
        assert_eq!(index.entry_count(), 0);
    }

    #[test]
    fn lru_index_remove_decrements_totals() {
        let index = LruIndex::new();
        index.record(&key(1), 1000);
        index.record(&key(2), 2000);

        let removed = index.remove(&key(1)).unwrap();
        assert_eq!(removed.size_bytes, 1000);
        assert_eq!(index.total_size(), 2000);
        assert_eq!(index.entry_count(), 1);
        assert!(!index.contains(&key(1)));

        assert!(index.remove(&key(1)).is_none());
        assert_eq!(index.total_size(), 2000);
    }

    #[test]
    fn lru_index_clear_resets_totals() {
        let index = LruIndex::new();
        index.record(&key(1), 10);
        index.record(&key(2), 20);
        index.clear();

        assert_eq!(index.total_size(), 0);
        assert_eq!(index.entry_count(), 0);
        assert!(!index.contains(&key(2)));
    }

    #[test]
    fn eviction_candidates_empty_within_capacity() {
        let index = LruIndex::new();
        index.record(&key(1), 100);
        index.record(&key(2), 100);

        assert!(index.eviction_candidates(200).is_empty());
    }

    #[test]
    fn eviction_candidates_least_recent_first_until_within_capacity() {
        let index = LruIndex::new();
        index.record(&key(1), 100);
        std::thread::sleep(Duration::from_millis(5));
        index.record(&key(2), 100);
        std::thread::sleep(Duration::from_millis(5));
        index.record(&key(3), 100);
        std::thread::sleep(Duration::from_millis(5));

        // Accessing the oldest entry makes key 2 the least recent.
        index.touch(&key(1));

        let candidates = index.eviction_candidates(150);
        let keys: Vec<_> = candidates.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec![key(2), key(3)]);
    }

    #[test]
    fn eviction_candidates_break_ties_by_creation_time() {
        let index = LruIndex::new();
        let accessed = Instant::now();
        let epoch = SystemTime::UNIX_EPOCH;

        index.record_with(
            &key(1),
            EntryMetadata {
                size_bytes: 10,
                created_at: epoch + Duration::from_secs(20),
                last_accessed: accessed,
            },
        );
        index.record_with(
            &key(2),
            EntryMetadata {
                size_bytes: 10,
                created_at: epoch + Duration::from_secs(10),
                last_accessed: accessed,
            },
        );

        let candidates = index.eviction_candidates(10);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key, key(2));
    }

    #[test]
    fn eviction_candidates_include_entry_larger_than_capacity() {
        let index = LruIndex::new();
        index.record(&key(1), 5000);

        let candidates = index.eviction_candidates(1000);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key, key(1));
    }
}

//! In-memory artifact store with LRU eviction.
//!
//! Used when no cache directory is configured, and as a fast store in tests.
//! Contents do not survive the process.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Instant, SystemTime};
use tracing::debug;

use super::lru_index::{EvictionCandidate, LruIndex};
use super::stats::StoreCounters;
use super::{ArtifactStore, BoxFuture, CacheEntry, StoreStats};
use crate::error::CacheError;
use crate::key::CacheKey;

/// Memory-backed [`ArtifactStore`].
pub struct MemoryStore {
    data: DashMap<CacheKey, Bytes>,
    index: LruIndex,
    capacity_bytes: u64,
    eviction_lock: Mutex<()>,
    counters: StoreCounters,
}

impl MemoryStore {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            data: DashMap::new(),
            index: LruIndex::new(),
            capacity_bytes,
            eviction_lock: Mutex::new(()),
            counters: StoreCounters::new(),
        }
    }

    /// Evict least recently used entries until within capacity.
    ///
    /// Returns the number of entries evicted.
    pub fn evict_if_needed(&self) -> u64 {
        let _guard = self.eviction_lock.lock();
        let candidates = self.index.eviction_candidates(self.capacity_bytes);
        self.evict_candidates(candidates)
    }

    /// Remove `candidates`, selecting fresh victims while still over capacity.
    ///
    /// Callers hold `eviction_lock`.
    fn evict_candidates(&self, mut candidates: Vec<EvictionCandidate>) -> u64 {
        let mut evicted = 0;
        let mut fresh = false;
        while !candidates.is_empty() {
            let mut pass = 0;
            for candidate in candidates {
                // Skip entries rewritten or touched since the candidates were taken.
                if self.index.get(&candidate.key) != Some(candidate.metadata) {
                    continue;
                }
                self.index.remove(&candidate.key);
                self.data.remove(&candidate.key);
                pass += 1;
            }
            evicted += pass;
            if pass == 0 && fresh {
                break;
            }
            candidates = self.index.eviction_candidates(self.capacity_bytes);
            fresh = true;
        }
        if evicted > 0 {
            self.counters.record_evictions(evicted);
            debug!(
                evicted,
                size_bytes = self.index.total_size(),
                capacity_bytes = self.capacity_bytes,
                "Memory store evicted entries"
            );
        }
        evicted
    }

    fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.data.get(key).map(|data| {
            let (created_at, last_accessed) = match self.index.get(key) {
                Some(meta) => (meta.created_at, meta.last_accessed),
                None => (SystemTime::now(), Instant::now()),
            };
            CacheEntry::new(key.clone(), data.value().clone(), created_at, last_accessed)
        })
    }
}

impl ArtifactStore for MemoryStore {
    fn lookup(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>> {
        let key = key.clone();
        Box::pin(async move {
            let entry = self.read(&key);
            match entry {
                Some(_) => self.counters.record_hit(),
                None => self.counters.record_miss(),
            }
            entry
        })
    }

    fn peek(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>> {
        let key = key.clone();
        Box::pin(async move { self.read(&key) })
    }

    fn insert(&self, key: CacheKey, data: Bytes) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let size = data.len() as u64;
            self.data.insert(key.clone(), data);
            self.index.record(&key, size);
            self.counters.record_write();
            self.evict_if_needed();
            Ok(())
        })
    }

    fn touch(&self, key: &CacheKey) -> BoxFuture<'_, ()> {
        let key = key.clone();
        Box::pin(async move {
            self.index.touch(&key);
        })
    }

    fn remove(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, CacheError>> {
        let key = key.clone();
        Box::pin(async move {
            self.index.remove(&key);
            Ok(self.data.remove(&key).is_some())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let _guard = self.eviction_lock.lock();
            self.data.clear();
            self.index.clear();
            Ok(())
        })
    }

    fn size_bytes(&self) -> u64 {
        self.index.total_size()
    }

    fn entry_count(&self) -> u64 {
        self.index.entry_count()
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn stats(&self) -> StoreStats {
        self.counters
            .snapshot(self.size_bytes(), self.entry_count(), self.capacity_bytes)
    }
}

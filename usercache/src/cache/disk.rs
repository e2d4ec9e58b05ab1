//! Persistent artifact store with LRU eviction.
//!
//! # File Layout
//!
//! One flat directory per store:
//! ```text
//! {directory}/{key}.cache      committed entries (see entry_file)
//! {directory}/{key}.{n}.tmp    in-progress writes, renamed into place
//! ```
//!
//! # Recency
//!
//! Last access lives in the in-memory [`LruIndex`] and is mirrored to the
//! file mtime on every hit, so recency survives a restart. Sizes count
//! artifact bytes; the fixed entry header is not charged against capacity.

use bytes::Bytes;
use dashmap::DashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::entry_file::{self, HEADER_LEN};
use super::lru_index::{EntryMetadata, EvictionCandidate, LruIndex};
use super::stats::StoreCounters;
use super::{ArtifactStore, BoxFuture, CacheEntry, StoreStats};
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::time::{from_epoch_ms, system_time_to_instant, to_epoch_ms};

const ENTRY_SUFFIX: &str = ".cache";
const TEMP_SUFFIX: &str = ".tmp";

/// What a startup scan found.
#[derive(Debug, Default)]
struct ScanOutcome {
    entries: Vec<(CacheKey, EntryMetadata)>,
    removed_corrupt: u64,
    removed_temp: u64,
}

/// Disk-backed [`ArtifactStore`].
pub struct DiskStore {
    directory: PathBuf,
    capacity_bytes: u64,
    index: LruIndex,
    /// Per-key write locks; entries are dropped once uncontended.
    write_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
    eviction_lock: Mutex<()>,
    temp_counter: AtomicU64,
    counters: StoreCounters,
}

impl DiskStore {
    /// Open (or create) a store rooted at `directory`.
    ///
    /// Rebuilds the index from existing entries, deletes corrupt entries and
    /// leftover temp files, and evicts if the directory is over capacity.
    pub async fn open(
        directory: impl Into<PathBuf>,
        capacity_bytes: u64,
    ) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            CacheError::Io(format!(
                "cannot create cache directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let scan_dir = directory.clone();
        let outcome = tokio::task::spawn_blocking(move || scan_directory(&scan_dir))
            .await
            .map_err(|e| CacheError::Io(format!("cache scan task failed: {}", e)))??;

        let store = Self {
            directory,
            capacity_bytes,
            index: LruIndex::new(),
            write_locks: DashMap::new(),
            eviction_lock: Mutex::new(()),
            temp_counter: AtomicU64::new(0),
            counters: StoreCounters::new(),
        };

        for (key, metadata) in &outcome.entries {
            store.index.record_with(key, *metadata);
        }
        for _ in 0..outcome.removed_corrupt {
            store.counters.record_corrupt_entry();
        }

        info!(
            dir = %store.directory.display(),
            entries = store.index.entry_count(),
            size_bytes = store.index.total_size(),
            capacity_bytes,
            removed_corrupt = outcome.removed_corrupt,
            removed_temp = outcome.removed_temp,
            "Disk store opened"
        );

        store.evict_if_needed().await;
        Ok(store)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the committed entry file for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory
            .join(format!("{}{}", key.as_str(), ENTRY_SUFFIX))
    }

    /// Evict least recently used entries until within capacity.
    ///
    /// Returns the number of entries evicted.
    pub async fn evict_if_needed(&self) -> u64 {
        let _guard = self.eviction_lock.lock().await;
        let candidates = self.index.eviction_candidates(self.capacity_bytes);
        self.evict_candidates(candidates).await
    }

    /// Remove `candidates`, selecting fresh victims while still over capacity.
    ///
    /// Callers hold `eviction_lock`.
    async fn evict_candidates(&self, mut candidates: Vec<EvictionCandidate>) -> u64 {
        if candidates.is_empty() {
            return 0;
        }

        let size_before = self.index.total_size();
        let mut evicted = 0u64;
        let mut fresh = false;
        while !candidates.is_empty() {
            let mut pass = 0u64;
            for candidate in candidates {
                if self.evict_one(&candidate.key, candidate.metadata).await {
                    pass += 1;
                }
                self.release_write_lock(&candidate.key);
            }
            evicted += pass;
            if pass == 0 && fresh {
                break;
            }
            candidates = self.index.eviction_candidates(self.capacity_bytes);
            fresh = true;
        }

        self.counters.record_evictions(evicted);
        info!(
            dir = %self.directory.display(),
            evicted,
            size_before,
            size_after = self.index.total_size(),
            capacity_bytes = self.capacity_bytes,
            "Disk store eviction complete"
        );
        evicted
    }

    async fn evict_one(&self, key: &CacheKey, expected: EntryMetadata) -> bool {
        let lock = self.write_lock(key);
        let _write = lock.lock().await;

        // Skip entries rewritten or touched since the candidates were taken.
        if self.index.get(key) != Some(expected) {
            return false;
        }

        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to evict cache entry");
                return false;
            }
        }
        self.index.remove(key);
        true
    }

    fn write_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_write_lock(&self, key: &CacheKey) {
        self.write_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn write_entry(&self, key: &CacheKey, data: &Bytes) -> io::Result<SystemTime> {
        let created_at = SystemTime::now();
        let encoded = entry_file::encode(to_epoch_ms(created_at).max(0) as u64, data);

        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .directory
            .join(format!("{}.{}{}", key.as_str(), n, TEMP_SUFFIX));

        let result = async {
            tokio::fs::write(&temp_path, &encoded).await?;
            tokio::fs::rename(&temp_path, self.entry_path(key)).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result.map(|()| created_at)
    }

    /// Read and validate an entry without touching the hit/miss counters.
    async fn read(&self, key: CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(&key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    self.index.remove(&key);
                } else {
                    warn!(key = %key, error = %e, "Unreadable cache entry treated as miss");
                }
                return None;
            }
        };

        let header = match entry_file::decode(&bytes) {
            Ok(header) => header,
            Err(e) => {
                warn!(key = %key, reason = %e, "Corrupt cache entry discarded");
                self.counters.record_corrupt_entry();
                self.discard_corrupt(&key).await;
                return None;
            }
        };

        let created_at = from_epoch_ms(header.created_ms as i64);
        let data = Bytes::from(bytes).slice(HEADER_LEN..);
        let last_accessed = match self.index.get(&key) {
            Some(meta) => meta.last_accessed,
            None => {
                // Written by another process since open.
                let now = Instant::now();
                self.index.record_with(
                    &key,
                    EntryMetadata {
                        size_bytes: data.len() as u64,
                        created_at,
                        last_accessed: now,
                    },
                );
                now
            }
        };

        Some(CacheEntry::new(key, data, created_at, last_accessed))
    }

    /// Delete an entry found to be corrupt, unless a valid write replaced it meanwhile.
    async fn discard_corrupt(&self, key: &CacheKey) {
        {
            let lock = self.write_lock(key);
            let _write = lock.lock().await;
            let path = self.entry_path(key);

            let still_corrupt = match tokio::fs::read(&path).await {
                Ok(bytes) => entry_file::decode(&bytes).is_err(),
                Err(_) => true,
            };
            if still_corrupt {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(key = %key, error = %e, "Failed to remove corrupt cache entry");
                    }
                }
                self.index.remove(key);
            }
        }
        self.release_write_lock(key);
    }
}

impl ArtifactStore for DiskStore {
    fn lookup(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>> {
        let key = key.clone();
        Box::pin(async move {
            let entry = self.read(key).await;
            match entry {
                Some(_) => self.counters.record_hit(),
                None => self.counters.record_miss(),
            }
            entry
        })
    }

    fn peek(&self, key: &CacheKey) -> BoxFuture<'_, Option<CacheEntry>> {
        let key = key.clone();
        Box::pin(self.read(key))
    }

    fn insert(&self, key: CacheKey, data: Bytes) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let written = {
                let lock = self.write_lock(&key);
                let _write = lock.lock().await;
                let written = self.write_entry(&key, &data).await;
                if let Ok(created_at) = written {
                    self.index.record_with(
                        &key,
                        EntryMetadata {
                            size_bytes: data.len() as u64,
                            created_at,
                            last_accessed: Instant::now(),
                        },
                    );
                }
                written
            };
            self.release_write_lock(&key);

            match written {
                Ok(_) => {
                    self.counters.record_write();
                    debug!(key = %key, size_bytes = data.len(), "Cache entry written");
                    self.evict_if_needed().await;
                    Ok(())
                }
                Err(e) => {
                    self.counters.record_write_failure();
                    Err(CacheError::StorePersistence(format!(
                        "failed to write {}: {}",
                        self.entry_path(&key).display(),
                        e
                    )))
                }
            }
        })
    }

    fn touch(&self, key: &CacheKey) -> BoxFuture<'_, ()> {
        let key = key.clone();
        Box::pin(async move {
            if !self.index.touch(&key) {
                return;
            }
            let path = self.entry_path(&key);
            let result = tokio::task::spawn_blocking(move || {
                std::fs::File::options()
                    .write(true)
                    .open(&path)?
                    .set_modified(SystemTime::now())
            })
            .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(key = %key, error = %e, "Failed to refresh entry mtime"),
                Err(e) => debug!(key = %key, error = %e, "Touch task failed"),
            }
        })
    }

    fn remove(&self, key: &CacheKey) -> BoxFuture<'_, Result<bool, CacheError>> {
        let key = key.clone();
        Box::pin(async move {
            let result = {
                let lock = self.write_lock(&key);
                let _write = lock.lock().await;
                self.index.remove(&key);
                tokio::fs::remove_file(self.entry_path(&key)).await
            };
            self.release_write_lock(&key);

            match result {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let _guard = self.eviction_lock.lock().await;
            let directory = self.directory.clone();
            let removed = tokio::task::spawn_blocking(move || clear_directory(&directory))
                .await
                .map_err(|e| CacheError::Io(format!("cache clear task failed: {}", e)))??;
            self.index.clear();
            info!(dir = %self.directory.display(), removed, "Disk store cleared");
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

/// Parse `{key}.cache` back into a key.
fn filename_to_key(filename: &str) -> Option<CacheKey> {
    let stem = filename.strip_suffix(ENTRY_SUFFIX)?;
    CacheKey::from_hex(stem)
}

/// Read and sanity-check an entry header without loading the payload.
fn read_entry_metadata(path: &Path, file_len: u64) -> io::Result<Option<(u64, u64)>> {
    let mut buf = [0u8; HEADER_LEN];
    let mut file = std::fs::File::open(path)?;
    if file.read_exact(&mut buf).is_err() {
        return Ok(None);
    }
    match entry_file::decode_header(&buf) {
        Ok(header) if HEADER_LEN as u64 + header.payload_len == file_len => {
            Ok(Some((header.created_ms, header.payload_len)))
        }
        _ => Ok(None),
    }
}

fn scan_directory(directory: &Path) -> Result<ScanOutcome, CacheError> {
    let mut outcome = ScanOutcome::default();

    for dir_entry in std::fs::read_dir(directory)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let metadata = match dir_entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if filename.ends_with(TEMP_SUFFIX) {
            if std::fs::remove_file(&path).is_ok() {
                outcome.removed_temp += 1;
            }
            continue;
        }

        let Some(key) = filename_to_key(filename) else {
            continue;
        };

        match read_entry_metadata(&path, metadata.len()) {
            Ok(Some((created_ms, payload_len))) => {
                let last_accessed = metadata
                    .modified()
                    .ok()
                    .and_then(system_time_to_instant)
                    .unwrap_or_else(Instant::now);
                outcome.entries.push((
                    key,
                    EntryMetadata {
                        size_bytes: payload_len,
                        created_at: from_epoch_ms(created_ms as i64),
                        last_accessed,
                    },
                ));
            }
            Ok(None) | Err(_) => {
                warn!(path = %path.display(), "Removing corrupt cache entry");
                if std::fs::remove_file(&path).is_ok() {
                    outcome.removed_corrupt += 1;
                }
            }
        }
    }

    Ok(outcome)
}

fn clear_directory(directory: &Path) -> Result<u64, CacheError> {
    let mut removed = 0;
    for dir_entry in std::fs::read_dir(directory)? {
        let path = dir_entry?.path();
        let ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| filename_to_key(n).is_some() || n.ends_with(TEMP_SUFFIX))
            .unwrap_or(false);
        if ours && path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(n: u8) -> CacheKey {
        CacheKey::from_hex(&format!("{:02x}", n).repeat(32)).unwrap()
    }

    async fn open_store(dir: &TempDir, capacity: u64) -> DiskStore {
        DiskStore::open(dir.path().join("thumbs"), capacity)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_lookup() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;

        store
            .insert(key(1), Bytes::from_static(b"thumbnail bytes"))
            .await
            .unwrap();

        let entry = store.lookup(&key(1)).await.unwrap();
        assert_eq!(entry.data, Bytes::from_static(b"thumbnail bytes"));
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.size_bytes(), 15);
        assert!(store.entry_path(&key(1)).exists());
    }

    #[tokio::test]
    async fn test_lookup_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;

        assert!(store.lookup(&key(1)).await.is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = open_store(&temp, 1_000_000).await;
            store.insert(key(1), Bytes::from_static(b"one")).await.unwrap();
            store.insert(key(2), Bytes::from_static(b"two")).await.unwrap();
        }

        let store = open_store(&temp, 1_000_000).await;
        assert_eq!(store.entry_count(), 2);
        assert_eq!(store.size_bytes(), 6);
        assert_eq!(
            store.lookup(&key(2)).await.unwrap().data,
            Bytes::from_static(b"two")
        );
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss_and_removed() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;
        store
            .insert(key(1), Bytes::from_static(b"artifact"))
            .await
            .unwrap();

        let path = store.entry_path(&key(1));
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        assert!(store.lookup(&key(1)).await.is_none());
        assert!(!path.exists());
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.stats().corrupt_entries, 1);
    }

    #[tokio::test]
    async fn test_open_removes_corrupt_and_temp_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("thumbs");
        std::fs::create_dir_all(&dir).unwrap();

        let good = entry_file::encode(1_000, b"good");
        std::fs::write(dir.join(format!("{}.cache", key(1))), &good).unwrap();
        std::fs::write(dir.join(format!("{}.cache", key(2))), &good[..10]).unwrap();
        std::fs::write(dir.join(format!("{}.7.tmp", key(3))), b"partial").unwrap();
        std::fs::write(dir.join("notes.txt"), b"unrelated").unwrap();

        let store = DiskStore::open(&dir, 1_000_000).await.unwrap();

        assert_eq!(store.entry_count(), 1);
        assert!(store.lookup(&key(1)).await.is_some());
        assert!(!dir.join(format!("{}.cache", key(2))).exists());
        assert!(!dir.join(format!("{}.7.tmp", key(3))).exists());
        assert!(dir.join("notes.txt").exists());
        assert_eq!(store.stats().corrupt_entries, 1);
    }

    #[tokio::test]
    async fn test_eviction_keeps_size_within_capacity() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 250).await;

        store.insert(key(1), Bytes::from(vec![1u8; 100])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.insert(key(2), Bytes::from(vec![2u8; 100])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.touch(&key(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.insert(key(3), Bytes::from(vec![3u8; 100])).await.unwrap();

        assert!(store.size_bytes() <= 250);
        assert!(store.lookup(&key(1)).await.is_some());
        assert!(store.lookup(&key(2)).await.is_none());
        assert!(!store.entry_path(&key(2)).exists());
        assert!(store.lookup(&key(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_touched_candidate_is_replaced_by_next_victim() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 250).await;

        store.insert(key(1), Bytes::from(vec![1u8; 100])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.insert(key(2), Bytes::from(vec![2u8; 100])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Victims chosen against a 100 byte budget, then the first is hit.
        let stale = store.index.eviction_candidates(100);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, key(1));
        store.touch(&key(1)).await;

        let data = Bytes::from(vec![3u8; 100]);
        store.write_entry(&key(3), &data).await.unwrap();
        store.index.record(&key(3), 100);
        assert_eq!(store.size_bytes(), 300);

        let evicted = {
            let _guard = store.eviction_lock.lock().await;
            store.evict_candidates(stale).await
        };

        assert_eq!(evicted, 1);
        assert!(store.size_bytes() <= 250);
        assert!(store.entry_path(&key(1)).exists());
        assert!(!store.entry_path(&key(2)).exists());
        assert!(store.entry_path(&key(3)).exists());
    }

    #[tokio::test]
    async fn test_peek_leaves_counters_alone() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;
        store.insert(key(1), Bytes::from_static(b"tile")).await.unwrap();

        let entry = store.peek(&key(1)).await.unwrap();
        assert_eq!(entry.data, Bytes::from_static(b"tile"));
        assert!(store.peek(&key(2)).await.is_none());

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test]
    async fn test_open_evicts_when_over_capacity() {
        let temp = TempDir::new().unwrap();
        {
            let store = open_store(&temp, 1_000_000).await;
            for n in 0..5 {
                store
                    .insert(key(n), Bytes::from(vec![n; 100]))
                    .await
                    .unwrap();
            }
        }

        let store = open_store(&temp, 300).await;
        assert!(store.size_bytes() <= 300);
        assert_eq!(store.entry_count(), 3);
    }

    #[tokio::test]
    async fn test_insert_failure_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;
        std::fs::remove_dir_all(store.directory()).unwrap();

        let err = store
            .insert(key(1), Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::StorePersistence(_)));
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.stats().write_failures, 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;
        store.insert(key(1), Bytes::from_static(b"a")).await.unwrap();
        store.insert(key(2), Bytes::from_static(b"b")).await.unwrap();

        assert!(store.remove(&key(1)).await.unwrap());
        assert!(!store.remove(&key(1)).await.unwrap());

        store.clear().await.unwrap();
        assert_eq!(store.entry_count(), 0);
        assert!(!store.entry_path(&key(2)).exists());
        assert!(store.lookup(&key(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_touch_refreshes_file_mtime() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, 1_000_000).await;
        store.insert(key(1), Bytes::from_static(b"a")).await.unwrap();

        let path = store.entry_path(&key(1));
        let old = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        store.touch(&key(1)).await;

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > old + Duration::from_secs(3000));
    }

    #[test]
    fn test_filename_to_key() {
        let k = key(0xab);
        assert_eq!(filename_to_key(&format!("{}.cache", k)), Some(k.clone()));
        assert_eq!(filename_to_key(&format!("{}.1.tmp", k)), None);
        assert_eq!(filename_to_key("short.cache"), None);
    }
}

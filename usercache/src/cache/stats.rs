//! Store statistics tracking and reporting.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by a store.
#[derive(Debug, Default)]
pub struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    evictions: AtomicU64,
    corrupt_entries: AtomicU64,
}

impl StoreCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_corrupt_entry(&self) {
        self.corrupt_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot combined with the store's current size figures.
    pub fn snapshot(&self, size_bytes: u64, entry_count: u64, capacity_bytes: u64) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            corrupt_entries: self.corrupt_entries.load(Ordering::Relaxed),
            size_bytes,
            entry_count,
            capacity_bytes,
        }
    }
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub evictions: u64,
    /// Entries discarded because their file failed validation.
    pub corrupt_entries: u64,
    pub size_bytes: u64,
    pub entry_count: u64,
    pub capacity_bytes: u64,
}

impl StoreStats {
    /// Hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Fraction of capacity in use (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.size_bytes as f64 / self.capacity_bytes as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = StoreCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_write();
        counters.record_write_failure();
        counters.record_evictions(3);
        counters.record_corrupt_entry();

        let stats = counters.snapshot(500, 2, 1000);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.corrupt_entries, 1);
        assert_eq!(stats.entry_count, 2);
    }

    #[test]
    fn test_hit_rate() {
        let stats = StoreStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(StoreStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_utilization() {
        let stats = StoreStats {
            size_bytes: 250,
            capacity_bytes: 1000,
            ..Default::default()
        };
        assert!((stats.utilization() - 0.25).abs() < f64::EPSILON);
        assert_eq!(StoreStats::default().utilization(), 0.0);
    }
}

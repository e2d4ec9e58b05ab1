//! Core cache types.

use bytes::Bytes;
use std::time::{Instant, SystemTime};

use crate::key::CacheKey;

/// A stored artifact together with its bookkeeping.
///
/// Immutable once written; a newer insert under the same key replaces it
/// wholesale.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Bytes,
    pub size_bytes: u64,
    pub created_at: SystemTime,
    pub last_accessed: Instant,
}

impl CacheEntry {
    pub fn new(key: CacheKey, data: Bytes, created_at: SystemTime, last_accessed: Instant) -> Self {
        Self {
            key,
            size_bytes: data.len() as u64,
            data,
            created_at,
            last_accessed,
        }
    }
}

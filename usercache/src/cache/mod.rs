//! Artifact storage.
//!
//! A store maps [`CacheKey`](crate::key::CacheKey)s to artifact bytes under a
//! capacity bound, evicting least recently used entries. [`DiskStore`]
//! persists across restarts; [`MemoryStore`] lives only as long as the
//! process. Both implement [`ArtifactStore`].

mod disk;
pub mod entry_file;
mod lru_index;
mod memory;
mod stats;
mod r#trait;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use disk::DiskStore;
pub use lru_index::{EntryMetadata, EvictionCandidate, LruIndex};
pub use memory::MemoryStore;
pub use r#trait::ArtifactStore;
pub use stats::{StoreCounters, StoreStats};
pub use types::CacheEntry;

/// Boxed future returned by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

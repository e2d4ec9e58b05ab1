//! usercache - User-level cache for generated thumbnails and map tiles
//!
//! Maps (source file, modification time, generation options) to a
//! previously rendered thumbnail or tile, renders each missing artifact at
//! most once even under concurrent requests, and stays correct when the
//! source changes on disk between calls.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use std::sync::Arc;
//! use usercache::render::ImageRenderer;
//! use usercache::service::{UserCache, UserCacheConfig};
//!
//! let config = UserCacheConfig::builder().cache_directory("/tmp/uc").build();
//! let cache = UserCache::open(config, Arc::new(ImageRenderer::new())).await?;
//!
//! let thumb = cache.get_thumbnail("/photos/a.jpg", mtime_ms, &serde_json::json!({})).await?;
//! let tile = cache.get_tile("/maps/ortho.tif", mtime_ms, 10, 5, 5, &serde_json::json!({})).await?;
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod key;
pub mod logging;
pub mod render;
pub mod service;
pub mod time;

pub use error::CacheError;

/// Version of the usercache library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

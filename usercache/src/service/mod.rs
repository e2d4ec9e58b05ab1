//! High-level cache facade.
//!
//! [`UserCache`] is the entry point a host runtime binds to: it owns a
//! [`ThumbnailCache`] and a [`TileCache`], each wiring key derivation, an
//! [`ArtifactStore`](crate::cache::ArtifactStore), a
//! [`GenerationCoordinator`](crate::coordinator::GenerationCoordinator) and a
//! [`Renderer`](crate::render::Renderer) together.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use usercache::config::ConfigFile;
//! use usercache::render::ImageRenderer;
//! use usercache::service::{UserCache, UserCacheConfig};
//!
//! let config = UserCacheConfig::from_config_file(&ConfigFile::load()?);
//! let cache = UserCache::open(config, Arc::new(ImageRenderer::new())).await?;
//! let artifact = cache.get_thumbnail(path, mtime_ms, &serde_json::json!({})).await?;
//! ```

mod config;
mod facade;
mod user_cache;

pub use config::{UserCacheConfig, UserCacheConfigBuilder};
pub use facade::{
    Artifact, ArtifactCache, ArtifactOrigin, Persistence, ThumbnailCache, ThumbnailRequest,
    TileCache, TileRequest,
};
pub use user_cache::{UserCache, UserCacheStats};

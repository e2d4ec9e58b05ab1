//! The user-level cache: thumbnails and tiles behind one handle.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::config::UserCacheConfig;
use super::facade::{Artifact, ThumbnailCache, ThumbnailRequest, TileCache, TileRequest};
use crate::cache::{ArtifactStore, DiskStore, MemoryStore, StoreStats};
use crate::coordinator::CoordinatorStats;
use crate::error::CacheError;
use crate::key::{ArtifactKind, GenerationOptions, TileCoord};
use crate::render::Renderer;

/// Thumbnail and tile caches sharing one renderer.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use usercache::render::ImageRenderer;
/// use usercache::service::{UserCache, UserCacheConfig};
///
/// let config = UserCacheConfig::builder().cache_directory("/tmp/uc").build();
/// let cache = UserCache::open(config, Arc::new(ImageRenderer::new())).await?;
///
/// let thumb = cache
///     .get_thumbnail("/photos/a.jpg", mtime_ms, &serde_json::json!({"maxDimension": 128}))
///     .await?;
/// let tile = cache.get_tile("/maps/ortho.tif", mtime_ms, 10, 5, 5, &serde_json::json!({})).await?;
/// ```
pub struct UserCache {
    config: UserCacheConfig,
    thumbnails: ThumbnailCache,
    tiles: TileCache,
}

/// Statistics for both artifact kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCacheStats {
    pub thumbnails: StoreStats,
    pub tiles: StoreStats,
    pub thumbnail_generation: CoordinatorStats,
    pub tile_generation: CoordinatorStats,
}

impl UserCache {
    /// Open the stores described by `config`.
    ///
    /// With a cache directory, each kind gets a [`DiskStore`] in its own
    /// subdirectory; otherwise both live in memory.
    pub async fn open(
        config: UserCacheConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, CacheError> {
        let thumbnail_store = open_store(&config, ArtifactKind::Thumbnail).await?;
        let tile_store = open_store(&config, ArtifactKind::Tile).await?;

        info!(
            directory = ?config.cache_directory(),
            thumbnail_capacity = config.thumbnail_capacity(),
            tile_capacity = config.tile_capacity(),
            "User cache opened"
        );

        Ok(Self::with_stores(config, thumbnail_store, tile_store, renderer))
    }

    /// Assemble from already opened stores.
    pub fn with_stores(
        config: UserCacheConfig,
        thumbnail_store: Arc<dyn ArtifactStore>,
        tile_store: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let thumbnails =
            ThumbnailCache::new(config.thumbnail_defaults(), thumbnail_store, Arc::clone(&renderer))
                .with_render_timeout(config.render_timeout());
        let tiles = TileCache::new(config.tile_defaults(), tile_store, renderer)
            .with_render_timeout(config.render_timeout());

        Self {
            config,
            thumbnails,
            tiles,
        }
    }

    pub fn config(&self) -> &UserCacheConfig {
        &self.config
    }

    /// Thumbnail for `path` as of `mtime_ms` (epoch milliseconds).
    ///
    /// `options` is a JSON object with any of `maxDimension`, `format`,
    /// `cacheCapacityBytes`, `cacheDir`.
    pub async fn get_thumbnail(
        &self,
        path: impl AsRef<Path>,
        mtime_ms: i64,
        options: &Value,
    ) -> Result<Artifact, CacheError> {
        let options = GenerationOptions::from_value(options)?;
        let request = ThumbnailRequest::new(path.as_ref(), mtime_ms).with_options(options);
        self.thumbnails.get(&request).await
    }

    /// Tile `z/x/y` of `path` as of `mtime_ms` (epoch milliseconds).
    pub async fn get_tile(
        &self,
        path: impl AsRef<Path>,
        mtime_ms: i64,
        z: u8,
        x: u32,
        y: u32,
        options: &Value,
    ) -> Result<Artifact, CacheError> {
        let options = GenerationOptions::from_value(options)?;
        let request =
            TileRequest::new(path.as_ref(), mtime_ms, TileCoord::new(z, x, y)).with_options(options);
        self.tiles.get(&request).await
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn tiles(&self) -> &TileCache {
        &self.tiles
    }

    /// Delete every cached thumbnail and tile.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.thumbnails.artifacts().store().clear().await?;
        self.tiles.artifacts().store().clear().await?;
        info!("User cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> UserCacheStats {
        UserCacheStats {
            thumbnails: self.thumbnails.artifacts().store_stats(),
            tiles: self.tiles.artifacts().store_stats(),
            thumbnail_generation: self.thumbnails.artifacts().coordinator_stats(),
            tile_generation: self.tiles.artifacts().coordinator_stats(),
        }
    }

    pub fn log_stats(&self) {
        self.thumbnails.artifacts().log_stats();
        self.tiles.artifacts().log_stats();
    }
}

async fn open_store(
    config: &UserCacheConfig,
    kind: ArtifactKind,
) -> Result<Arc<dyn ArtifactStore>, CacheError> {
    let capacity = config.capacity(kind);
    Ok(match config.store_directory(kind) {
        Some(directory) => Arc::new(DiskStore::open(directory, capacity).await?),
        None => Arc::new(MemoryStore::new(capacity)),
    })
}

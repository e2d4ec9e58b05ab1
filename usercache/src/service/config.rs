//! User cache configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    ConfigFile, DEFAULT_RENDER_TIMEOUT_SECS, DEFAULT_THUMBNAIL_CAPACITY,
    DEFAULT_THUMBNAIL_FORMAT, DEFAULT_THUMBNAIL_MAX_DIMENSION, DEFAULT_TILE_CAPACITY,
    DEFAULT_TILE_FORMAT, DEFAULT_TILE_SIZE,
};
use crate::key::{ArtifactKind, RenderOptions};

/// Configuration for a [`UserCache`](super::UserCache).
///
/// Fixed at construction. Per-call `cacheDir` / `cacheCapacityBytes` options
/// are validated but never change it.
///
/// # Example
///
/// ```
/// use usercache::service::UserCacheConfig;
///
/// let config = UserCacheConfig::builder()
///     .cache_directory("/tmp/uc")
///     .thumbnail_capacity(64 * 1024 * 1024)
///     .render_timeout(None)
///     .build();
///
/// assert_eq!(config.thumbnail_capacity(), 64 * 1024 * 1024);
/// assert!(config.render_timeout().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCacheConfig {
    /// Cache root; `None` keeps everything in memory
    cache_directory: Option<PathBuf>,
    thumbnail_capacity: u64,
    tile_capacity: u64,
    /// Used when a thumbnail request leaves an option out
    thumbnail_defaults: RenderOptions,
    /// Used when a tile request leaves an option out
    tile_defaults: RenderOptions,
    /// Longest a single render may run
    render_timeout: Option<Duration>,
}

impl UserCacheConfig {
    /// Create a new configuration builder.
    pub fn builder() -> UserCacheConfigBuilder {
        UserCacheConfigBuilder::default()
    }

    /// Build from the user's configuration file.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        Self {
            cache_directory: file.cache.directory.clone(),
            thumbnail_capacity: file.cache.thumbnail_capacity,
            tile_capacity: file.cache.tile_capacity,
            thumbnail_defaults: RenderOptions::new(
                file.thumbnail.max_dimension,
                file.thumbnail.format,
            ),
            tile_defaults: RenderOptions::new(file.tile.size, file.tile.format),
            render_timeout: file.render.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn cache_directory(&self) -> Option<&PathBuf> {
        self.cache_directory.as_ref()
    }

    /// Store directory for one artifact kind, if the cache is on disk.
    pub fn store_directory(&self, kind: ArtifactKind) -> Option<PathBuf> {
        self.cache_directory
            .as_ref()
            .map(|root| root.join(kind.directory_name()))
    }

    pub fn thumbnail_capacity(&self) -> u64 {
        self.thumbnail_capacity
    }

    pub fn tile_capacity(&self) -> u64 {
        self.tile_capacity
    }

    /// Capacity of the store for one artifact kind.
    pub fn capacity(&self, kind: ArtifactKind) -> u64 {
        match kind {
            ArtifactKind::Thumbnail => self.thumbnail_capacity,
            ArtifactKind::Tile => self.tile_capacity,
        }
    }

    pub fn thumbnail_defaults(&self) -> RenderOptions {
        self.thumbnail_defaults
    }

    pub fn tile_defaults(&self) -> RenderOptions {
        self.tile_defaults
    }

    /// Render defaults for one artifact kind.
    pub fn defaults(&self, kind: ArtifactKind) -> RenderOptions {
        match kind {
            ArtifactKind::Thumbnail => self.thumbnail_defaults,
            ArtifactKind::Tile => self.tile_defaults,
        }
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout
    }
}

impl Default for UserCacheConfig {
    fn default() -> Self {
        Self::from_config_file(&ConfigFile::default())
    }
}

/// Builder for [`UserCacheConfig`].
///
/// Starts in memory-only mode with the default capacities and render options.
#[derive(Debug, Clone)]
pub struct UserCacheConfigBuilder {
    config: UserCacheConfig,
}

impl Default for UserCacheConfigBuilder {
    fn default() -> Self {
        Self {
            config: UserCacheConfig {
                cache_directory: None,
                thumbnail_capacity: DEFAULT_THUMBNAIL_CAPACITY,
                tile_capacity: DEFAULT_TILE_CAPACITY,
                thumbnail_defaults: RenderOptions::new(
                    DEFAULT_THUMBNAIL_MAX_DIMENSION,
                    DEFAULT_THUMBNAIL_FORMAT,
                ),
                tile_defaults: RenderOptions::new(DEFAULT_TILE_SIZE, DEFAULT_TILE_FORMAT),
                render_timeout: Some(Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS)),
            },
        }
    }
}

impl UserCacheConfigBuilder {
    /// Persist artifacts under `directory` (`thumbs/` and `tiles/` subdirectories).
    pub fn cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.cache_directory = Some(directory.into());
        self
    }

    /// Keep artifacts in memory only.
    pub fn in_memory(mut self) -> Self {
        self.config.cache_directory = None;
        self
    }

    pub fn thumbnail_capacity(mut self, bytes: u64) -> Self {
        self.config.thumbnail_capacity = bytes;
        self
    }

    pub fn tile_capacity(mut self, bytes: u64) -> Self {
        self.config.tile_capacity = bytes;
        self
    }

    pub fn thumbnail_defaults(mut self, defaults: RenderOptions) -> Self {
        self.config.thumbnail_defaults = defaults;
        self
    }

    pub fn tile_defaults(mut self, defaults: RenderOptions) -> Self {
        self.config.tile_defaults = defaults;
        self
    }

    /// `None` lets a render run for as long as it takes.
    pub fn render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    pub fn build(self) -> UserCacheConfig {
        self.config
    }
}

//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::key::ImageFormat;

/// Default thumbnail store capacity (512 MB).
pub const DEFAULT_THUMBNAIL_CAPACITY: u64 = 512 * 1024 * 1024;

/// Default tile store capacity (2 GB).
pub const DEFAULT_TILE_CAPACITY: u64 = 2 * 1024 * 1024 * 1024;

pub const DEFAULT_THUMBNAIL_MAX_DIMENSION: u32 = 256;
pub const DEFAULT_THUMBNAIL_FORMAT: ImageFormat = ImageFormat::Webp;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;
pub const DEFAULT_TILE_FORMAT: ImageFormat = ImageFormat::Png;

/// Default per-render timeout in seconds.
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;

/// Directory name used under the platform cache directory.
pub const CACHE_DIR_NAME: &str = "usercache";

/// Default cache root: the platform cache directory (`~/.cache/usercache` on Linux).
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: Some(default_cache_directory()),
                thumbnail_capacity: DEFAULT_THUMBNAIL_CAPACITY,
                tile_capacity: DEFAULT_TILE_CAPACITY,
            },
            thumbnail: ThumbnailSettings {
                max_dimension: DEFAULT_THUMBNAIL_MAX_DIMENSION,
                format: DEFAULT_THUMBNAIL_FORMAT,
            },
            tile: TileSettings {
                size: DEFAULT_TILE_SIZE,
                format: DEFAULT_TILE_FORMAT,
            },
            render: RenderSettings {
                timeout_secs: Some(DEFAULT_RENDER_TIMEOUT_SECS),
            },
            logging: LoggingSettings { file: None },
        }
    }
}

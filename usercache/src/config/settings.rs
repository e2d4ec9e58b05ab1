//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::key::ImageFormat;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub thumbnail: ThumbnailSettings,
    pub tile: TileSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`: where artifacts live and how much space each kind may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Root directory; `thumbs/` and `tiles/` are created beneath it.
    /// `None` keeps artifacts in memory only.
    pub directory: Option<PathBuf>,
    /// Thumbnail store capacity in bytes
    pub thumbnail_capacity: u64,
    /// Tile store capacity in bytes
    pub tile_capacity: u64,
}

/// `[thumbnail]`: defaults for thumbnail requests that omit an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSettings {
    pub max_dimension: u32,
    pub format: ImageFormat,
}

/// `[tile]`: defaults for tile requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSettings {
    /// Tile edge length in pixels
    pub size: u32,
    pub format: ImageFormat,
}

/// `[render]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Per-render timeout in seconds; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path; `None` logs to stderr only.
    pub file: Option<PathBuf>,
}

//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let directory = config
        .cache
        .directory
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();
    let log_file = config
        .logging
        .file
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[cache]
; Root directory for cached artifacts. Thumbnails go to <directory>/thumbs/,
; tiles to <directory>/tiles/. Leave empty to keep artifacts in memory only.
directory = {}
; Thumbnail store capacity (default: 512MB). Supports KB, MB, GB suffixes.
thumbnail_capacity = {}
; Tile store capacity (default: 2GB). Supports KB, MB, GB suffixes.
tile_capacity = {}

[thumbnail]
; Longest edge in pixels when a request does not set maxDimension (default: 256)
max_dimension = {}
; Output format when a request does not set format: png, jpeg, webp (default: webp)
format = {}

[tile]
; Tile edge length in pixels (default: 256)
size = {}
; Output format: png, jpeg, webp (default: png)
format = {}

[render]
; Seconds a single render may take before failing (default: 30, 0 disables)
timeout_secs = {}

[logging]
; Log file path. Leave empty to log to stderr only.
file = {}
"#,
        directory,
        format_size(config.cache.thumbnail_capacity),
        format_size(config.cache.tile_capacity),
        config.thumbnail.max_dimension,
        config.thumbnail.format,
        config.tile.size,
        config.tile.format,
        config.render.timeout_secs.unwrap_or(0),
        log_file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

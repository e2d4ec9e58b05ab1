//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::key::{ImageFormat, MAX_DIMENSION_LIMIT};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.cache.directory = if v.is_empty() {
                None
            } else {
                Some(expand_tilde(v))
            };
        }
        if let Some(v) = section.get("thumbnail_capacity") {
            config.cache.thumbnail_capacity = capacity("cache", "thumbnail_capacity", v)?;
        }
        if let Some(v) = section.get("tile_capacity") {
            config.cache.tile_capacity = capacity("cache", "tile_capacity", v)?;
        }
    }

    // [thumbnail] section
    if let Some(section) = ini.section(Some("thumbnail")) {
        if let Some(v) = section.get("max_dimension") {
            config.thumbnail.max_dimension = dimension("thumbnail", "max_dimension", v)?;
        }
        if let Some(v) = section.get("format") {
            config.thumbnail.format = format("thumbnail", v)?;
        }
    }

    // [tile] section
    if let Some(section) = ini.section(Some("tile")) {
        if let Some(v) = section.get("size") {
            config.tile.size = dimension("tile", "size", v)?;
        }
        if let Some(v) = section.get("format") {
            config.tile.format = format("tile", v)?;
        }
    }

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("timeout_secs") {
            let secs: u64 = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "render".to_string(),
                key: "timeout_secs".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (seconds, 0 disables)".to_string(),
            })?;
            config.render.timeout_secs = (secs > 0).then_some(secs);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            config.logging.file = if v.is_empty() {
                None
            } else {
                Some(expand_tilde(v))
            };
        }
    }

    Ok(config)
}

fn capacity(section: &str, key: &str, v: &str) -> Result<u64, ConfigFileError> {
    match parse_size(v) {
        Ok(bytes) if bytes > 0 => Ok(bytes),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: v.to_string(),
            reason: "expected a non-zero size like '2GB', '500MB', or '1024KB'".to_string(),
        }),
    }
}

fn dimension(section: &str, key: &str, v: &str) -> Result<u32, ConfigFileError> {
    match v.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_DIMENSION_LIMIT).contains(&n) => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: v.to_string(),
            reason: format!("must be an integer between 1 and {}", MAX_DIMENSION_LIMIT),
        }),
    }
}

fn format(section: &str, v: &str) -> Result<ImageFormat, ConfigFileError> {
    v.parse().map_err(|_| ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: "format".to_string(),
        value: v.to_string(),
        reason: "must be one of: png, jpeg, webp".to_string(),
    })
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_yields_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_full_ini_overrides_everything() {
        let config = parse(
            r#"
[cache]
directory = /var/cache/uc
thumbnail_capacity = 64MB
tile_capacity = 1GB

[thumbnail]
max_dimension = 512
format = JPG

[tile]
size = 512
format = webp

[render]
timeout_secs = 5

[logging]
file = /tmp/uc.log
"#,
        )
        .unwrap();

        assert_eq!(config.cache.directory, Some(PathBuf::from("/var/cache/uc")));
        assert_eq!(config.cache.thumbnail_capacity, 64 * 1024 * 1024);
        assert_eq!(config.cache.tile_capacity, 1024 * 1024 * 1024);
        assert_eq!(config.thumbnail.max_dimension, 512);
        assert_eq!(config.thumbnail.format, ImageFormat::Jpeg);
        assert_eq!(config.tile.size, 512);
        assert_eq!(config.tile.format, ImageFormat::Webp);
        assert_eq!(config.render.timeout_secs, Some(5));
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/uc.log")));
    }

    #[test]
    fn test_empty_directory_means_memory_only() {
        let config = parse("[cache]\ndirectory =\n").unwrap();
        assert_eq!(config.cache.directory, None);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = parse("[render]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.render.timeout_secs, None);
    }

    #[test]
    fn test_invalid_values_name_their_key() {
        let cases = [
            ("[cache]\nthumbnail_capacity = lots\n", "thumbnail_capacity"),
            ("[cache]\ntile_capacity = 0\n", "tile_capacity"),
            ("[thumbnail]\nmax_dimension = 0\n", "max_dimension"),
            ("[thumbnail]\nformat = gif\n", "format"),
            ("[tile]\nsize = 99999\n", "size"),
            ("[render]\ntimeout_secs = -3\n", "timeout_secs"),
        ];
        for (content, expected_key) in cases {
            match parse(content) {
                Err(ConfigFileError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected InvalidValue for {}, got {:?}", expected_key, other),
            }
        }
    }

    #[test]
    fn test_default_capacities() {
        let config = parse("[thumbnail]\nformat = png\n").unwrap();
        assert_eq!(config.cache.thumbnail_capacity, DEFAULT_THUMBNAIL_CAPACITY);
        assert_eq!(config.cache.tile_capacity, DEFAULT_TILE_CAPACITY);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x/y"), home.join("x/y"));
        }
    }
}

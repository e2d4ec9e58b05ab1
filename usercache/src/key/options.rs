//! Generation options as passed by the host runtime.
//!
//! Options arrive as a loosely-typed JSON object. They are parsed into
//! [`GenerationOptions`] (rejecting anything unrecognized) and then resolved
//! against per-kind defaults into [`RenderOptions`], the normalized form that
//! feeds both the cache key and the renderer.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CacheError;

/// Option name for the maximum output dimension in pixels.
pub const OPT_MAX_DIMENSION: &str = "maxDimension";
/// Option name for the output image format.
pub const OPT_FORMAT: &str = "format";
/// Option name for the cache capacity in bytes.
pub const OPT_CACHE_CAPACITY_BYTES: &str = "cacheCapacityBytes";
/// Option name for the cache directory.
pub const OPT_CACHE_DIR: &str = "cacheDir";

/// Every option name the cache accepts.
pub const RECOGNIZED_OPTIONS: [&str; 4] = [
    OPT_MAX_DIMENSION,
    OPT_FORMAT,
    OPT_CACHE_CAPACITY_BYTES,
    OPT_CACHE_DIR,
];

/// Largest accepted `maxDimension`.
pub const MAX_DIMENSION_LIMIT: u32 = 16_384;

/// Encoded image format of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Canonical lowercase name, used in cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// MIME type of the encoded artifact.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(CacheError::InvalidOptions(format!(
                "{} must be one of png, jpeg, webp (got '{}')",
                OPT_FORMAT, other
            ))),
        }
    }
}

/// Parsed per-request options. `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    pub max_dimension: Option<u32>,
    pub format: Option<ImageFormat>,
    pub cache_capacity_bytes: Option<u64>,
    pub cache_dir: Option<PathBuf>,
}

impl GenerationOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Parse options from any JSON value.
    ///
    /// `null` is treated as an empty object; any other non-object is rejected.
    pub fn from_value(value: &Value) -> Result<Self, CacheError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Self::from_map(map),
            other => Err(CacheError::InvalidOptions(format!(
                "options must be an object, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Parse options from a JSON object.
    ///
    /// Unrecognized keys and values of the wrong type or range are rejected
    /// with [`CacheError::InvalidOptions`].
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, CacheError> {
        let mut options = Self::default();

        for (name, value) in map {
            match name.as_str() {
                OPT_MAX_DIMENSION => {
                    let n = positive_integer(name, value)?;
                    if n > MAX_DIMENSION_LIMIT as u64 {
                        return Err(CacheError::InvalidOptions(format!(
                            "{} must be at most {} (got {})",
                            OPT_MAX_DIMENSION, MAX_DIMENSION_LIMIT, n
                        )));
                    }
                    options.max_dimension = Some(n as u32);
                }
                OPT_FORMAT => {
                    let s = value.as_str().ok_or_else(|| {
                        CacheError::InvalidOptions(format!(
                            "{} must be a string, got {}",
                            OPT_FORMAT,
                            json_type_name(value)
                        ))
                    })?;
                    options.format = Some(s.parse()?);
                }
                OPT_CACHE_CAPACITY_BYTES => {
                    options.cache_capacity_bytes = Some(positive_integer(name, value)?);
                }
                OPT_CACHE_DIR => match value.as_str().map(str::trim) {
                    Some(dir) if !dir.is_empty() => options.cache_dir = Some(PathBuf::from(dir)),
                    _ => {
                        return Err(CacheError::InvalidOptions(format!(
                            "{} must be a non-empty string",
                            OPT_CACHE_DIR
                        )))
                    }
                },
                unknown => {
                    return Err(CacheError::InvalidOptions(format!(
                        "unknown option '{}' (recognized: {})",
                        unknown,
                        RECOGNIZED_OPTIONS.join(", ")
                    )))
                }
            }
        }

        Ok(options)
    }

    /// Resolve against per-kind defaults.
    pub fn resolve(&self, defaults: &RenderOptions) -> RenderOptions {
        RenderOptions {
            max_dimension: self.max_dimension.unwrap_or(defaults.max_dimension),
            format: self.format.unwrap_or(defaults.format),
        }
    }
}

/// Normalized options that affect the generated artifact.
///
/// For thumbnails `max_dimension` bounds the longest edge; for tiles it is
/// the tile edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RenderOptions {
    pub max_dimension: u32,
    pub format: ImageFormat,
}

impl RenderOptions {
    pub fn new(max_dimension: u32, format: ImageFormat) -> Self {
        Self {
            max_dimension,
            format,
        }
    }
}

fn positive_integer(name: &str, value: &Value) -> Result<u64, CacheError> {
    match value.as_u64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(CacheError::InvalidOptions(format!(
            "{} must be a positive integer, got {}",
            name, value
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

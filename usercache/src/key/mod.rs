//! Cache key derivation.
//!
//! A [`CacheKey`] is the SHA-256 digest of a canonical, versioned text form
//! of everything that determines an artifact's bytes: artifact kind,
//! canonical source path, source modification time, normalized render
//! options and, for tiles, the z/x/y coordinate.
//!
//! ```text
//! v2
//! kind=tile
//! path=2f646174612f6f7274686f2e746966
//! mtime_ms=1700000000000
//! format=png
//! max_dimension=256
//! tile=10/5/5
//! ```
//!
//! The path is written as the hex of its raw OS bytes. Options are parsed into a struct before encoding, so option insertion
//! order and equivalent spellings (`jpg`/`jpeg`, explicit default vs absent)
//! never change the key. The modification time is caller-supplied epoch
//! milliseconds: when a source changes on disk the caller passes a new mtime,
//! the key changes and entries under the old key are left to LRU eviction.

mod options;

pub use options::{
    GenerationOptions, ImageFormat, RenderOptions, MAX_DIMENSION_LIMIT, OPT_CACHE_CAPACITY_BYTES,
    OPT_CACHE_DIR, OPT_FORMAT, OPT_MAX_DIMENSION, RECOGNIZED_OPTIONS,
};

use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use crate::error::CacheError;

/// Bumped whenever the canonical encoding changes, orphaning old entries.
const KEY_FORMAT_VERSION: u32 = 2;

/// Highest accepted tile zoom level.
pub const MAX_TILE_ZOOM: u8 = 30;

/// Kind of derived artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Thumbnail,
    Tile,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Tile => "tile",
        }
    }

    /// Subdirectory of the cache root holding this kind's entries.
    pub fn directory_name(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbs",
            Self::Tile => "tiles",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XYZ tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along each axis at this zoom level.
    pub fn tiles_per_axis(self) -> u64 {
        1u64 << self.z
    }

    /// Check that the zoom is supported and x/y lie inside the zoom's grid.
    pub fn validate(self) -> Result<(), CacheError> {
        if self.z > MAX_TILE_ZOOM {
            return Err(CacheError::InvalidOptions(format!(
                "tile zoom {} exceeds maximum {}",
                self.z, MAX_TILE_ZOOM
            )));
        }
        let n = self.tiles_per_axis();
        if self.x as u64 >= n || self.y as u64 >= n {
            return Err(CacheError::InvalidOptions(format!(
                "tile {}/{}/{} is outside the {}x{} grid of zoom {}",
                self.z, self.x, self.y, n, n, self.z
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Opaque, immutable cache key (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 64;

    /// Parse a key from its hex form, as found in cache file names.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == Self::HEX_LEN
            && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of key derivation: the key plus the normalized inputs it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: CacheKey,
    pub kind: ArtifactKind,
    pub source: PathBuf,
    pub mtime_ms: i64,
    pub options: RenderOptions,
    pub tile: Option<TileCoord>,
}

/// Builds stable cache keys for one artifact kind.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    kind: ArtifactKind,
    defaults: RenderOptions,
}

impl KeyDeriver {
    /// Create a deriver for `kind` with the defaults used when an option is absent.
    pub fn new(kind: ArtifactKind, defaults: RenderOptions) -> Self {
        Self { kind, defaults }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn defaults(&self) -> RenderOptions {
        self.defaults
    }

    /// Derive the key for a request.
    ///
    /// `tile` must be present for tiles and absent for thumbnails.
    pub fn derive(
        &self,
        source: &Path,
        mtime_ms: i64,
        options: &GenerationOptions,
        tile: Option<TileCoord>,
    ) -> Result<DerivedKey, CacheError> {
        match (self.kind, tile) {
            (ArtifactKind::Tile, Some(coord)) => coord.validate()?,
            (ArtifactKind::Tile, None) => {
                return Err(CacheError::InvalidOptions(
                    "tile requests require a z/x/y coordinate".to_string(),
                ))
            }
            (ArtifactKind::Thumbnail, Some(_)) => {
                return Err(CacheError::InvalidOptions(
                    "thumbnail requests take no tile coordinate".to_string(),
                ))
            }
            (ArtifactKind::Thumbnail, None) => {}
        }

        if source.as_os_str().is_empty() {
            return Err(CacheError::InvalidOptions(
                "source path must not be empty".to_string(),
            ));
        }

        let source = canonical_path(source);
        let options = options.resolve(&self.defaults);
        let canonical = canonical_form(self.kind, &source, mtime_ms, &options, tile);
        let key = CacheKey(format!("{:x}", Sha256::digest(canonical.as_bytes())));

        Ok(DerivedKey {
            key,
            kind: self.kind,
            source,
            mtime_ms,
            options,
            tile,
        })
    }
}

/// Canonicalize a source path.
///
/// Resolves symlinks and relative components when the path exists; a path
/// that cannot be resolved (it may vanish before rendering) is made absolute
/// and normalized lexically instead.
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn canonical_form(
    kind: ArtifactKind,
    source: &Path,
    mtime_ms: i64,
    options: &RenderOptions,
    tile: Option<TileCoord>,
) -> String {
    let mut out = String::with_capacity(160);
    // Writing to a String cannot fail.
    let _ = writeln!(out, "v{}", KEY_FORMAT_VERSION);
    let _ = writeln!(out, "kind={}", kind.as_str());
    // Raw OS bytes as hex, so paths that are not valid UTF-8 stay distinct.
    let _ = write!(out, "path=");
    for byte in source.as_os_str().as_encoded_bytes() {
        let _ = write!(out, "{:02x}", byte);
    }
    out.push('\n');
    let _ = writeln!(out, "mtime_ms={}", mtime_ms);
    let _ = writeln!(out, "format={}", options.format.as_str());
    let _ = writeln!(out, "max_dimension={}", options.max_dimension);
    if let Some(coord) = tile {
        let _ = writeln!(out, "tile={}", coord);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    fn thumbnail_deriver() -> KeyDeriver {
        KeyDeriver::new(
            ArtifactKind::Thumbnail,
            RenderOptions::new(256, ImageFormat::Webp),
        )
    }

    fn tile_deriver() -> KeyDeriver {
        KeyDeriver::new(ArtifactKind::Tile, RenderOptions::new(256, ImageFormat::Png))
    }

    fn thumb_key(mtime_ms: i64, options: &GenerationOptions) -> CacheKey {
        thumbnail_deriver()
            .derive(Path::new("/data/photo.jpg"), mtime_ms, options, None)
            .unwrap()
            .key
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_get_distinct_keys() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let first = Path::new(OsStr::from_bytes(b"/photos/a\xff.jpg"));
        let second = Path::new(OsStr::from_bytes(b"/photos/a\xfe.jpg"));
        let options = GenerationOptions::new();
        let deriver = thumbnail_deriver();

        let a = deriver.derive(first, 1000, &options, None).unwrap();
        let b = deriver.derive(second, 1000, &options, None).unwrap();

        assert_ne!(a.key, b.key);
        assert_eq!(a.key, deriver.derive(first, 1000, &options, None).unwrap().key);
    }

    #[test]
    fn test_same_inputs_same_key() {
        let options = GenerationOptions::new().with_max_dimension(256);
        assert_eq!(thumb_key(1000, &options), thumb_key(1000, &options));
    }

    #[test]
    fn test_key_is_hex_digest() {
        let key = thumb_key(1000, &GenerationOptions::new());
        assert_eq!(key.as_str().len(), CacheKey::HEX_LEN);
        assert_eq!(CacheKey::from_hex(key.as_str()), Some(key));
    }

    #[test]
    fn test_mtime_changes_key() {
        let options = GenerationOptions::new();
        assert_ne!(thumb_key(1000, &options), thumb_key(2000, &options));
    }

    #[test]
    fn test_explicit_default_equals_absent() {
        let explicit = GenerationOptions::new()
            .with_max_dimension(256)
            .with_format(ImageFormat::Webp);
        assert_eq!(
            thumb_key(1000, &explicit),
            thumb_key(1000, &GenerationOptions::new())
        );
    }

    #[test]
    fn test_cache_only_options_do_not_affect_key() {
        let with_cache_opts = GenerationOptions::from_value(&json!({
            "cacheDir": "/elsewhere",
            "cacheCapacityBytes": 4096,
        }))
        .unwrap();
        assert_eq!(
            thumb_key(1000, &with_cache_opts),
            thumb_key(1000, &GenerationOptions::new())
        );
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let thumb = thumbnail_deriver()
            .derive(Path::new("/data/a.tif"), 1, &GenerationOptions::new(), None)
            .unwrap();
        let tile = KeyDeriver::new(ArtifactKind::Tile, RenderOptions::new(256, ImageFormat::Webp))
            .derive(
                Path::new("/data/a.tif"),
                1,
                &GenerationOptions::new(),
                Some(TileCoord::new(0, 0, 0)),
            )
            .unwrap();
        assert_ne!(thumb.key, tile.key);
    }

    #[test]
    fn test_tile_coordinates_change_key() {
        let deriver = tile_deriver();
        let options = GenerationOptions::new();
        let a = deriver
            .derive(Path::new("/o.tif"), 1, &options, Some(TileCoord::new(10, 5, 5)))
            .unwrap();
        let b = deriver
            .derive(Path::new("/o.tif"), 1, &options, Some(TileCoord::new(10, 5, 6)))
            .unwrap();
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_tile_coordinate_validation() {
        let deriver = tile_deriver();
        let options = GenerationOptions::new();
        let path = Path::new("/o.tif");

        assert!(deriver
            .derive(path, 1, &options, Some(TileCoord::new(1, 1, 1)))
            .is_ok());
        assert!(matches!(
            deriver.derive(path, 1, &options, Some(TileCoord::new(1, 2, 0))),
            Err(CacheError::InvalidOptions(_))
        ));
        assert!(matches!(
            deriver.derive(path, 1, &options, Some(TileCoord::new(31, 0, 0))),
            Err(CacheError::InvalidOptions(_))
        ));
        assert!(matches!(
            deriver.derive(path, 1, &options, None),
            Err(CacheError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_thumbnail_rejects_tile_coordinate() {
        let result = thumbnail_deriver().derive(
            Path::new("/a.jpg"),
            1,
            &GenerationOptions::new(),
            Some(TileCoord::new(0, 0, 0)),
        );
        assert!(matches!(result, Err(CacheError::InvalidOptions(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = thumbnail_deriver().derive(Path::new(""), 1, &GenerationOptions::new(), None);
        assert!(matches!(result, Err(CacheError::InvalidOptions(_))));
    }

    #[test]
    fn test_lexical_normalization_of_missing_paths() {
        let a = canonical_path(Path::new("/no/such/dir/../photo.jpg"));
        let b = canonical_path(Path::new("/no/such/./photo.jpg"));
        assert_eq!(a, PathBuf::from("/no/such/photo.jpg"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_existing_paths_are_resolved() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("photo.jpg");
        std::fs::write(&file, b"x").unwrap();

        let dotted = temp.path().join(".").join("photo.jpg");
        assert_eq!(canonical_path(&dotted), canonical_path(&file));
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert_eq!(CacheKey::from_hex("abc"), None);
        assert_eq!(CacheKey::from_hex(&"G".repeat(64)), None);
        assert_eq!(CacheKey::from_hex(&"A".repeat(64)), None);
        assert!(CacheKey::from_hex(&"a".repeat(64)).is_some());
    }

    fn format_strategy() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("png"), Just("jpeg"), Just("jpg"), Just("webp"), Just("PNG")]
    }

    proptest! {
        /// Insertion order of option keys never changes the derived key.
        #[test]
        fn key_is_independent_of_option_order(
            max_dimension in 1u32..=MAX_DIMENSION_LIMIT,
            format in format_strategy(),
            mtime_ms in any::<i64>(),
        ) {
            let mut forward = Map::new();
            forward.insert(OPT_MAX_DIMENSION.to_string(), Value::from(max_dimension));
            forward.insert(OPT_FORMAT.to_string(), Value::from(format));

            let mut reverse = Map::new();
            reverse.insert(OPT_FORMAT.to_string(), Value::from(format));
            reverse.insert(OPT_MAX_DIMENSION.to_string(), Value::from(max_dimension));

            let a = GenerationOptions::from_map(&forward).unwrap();
            let b = GenerationOptions::from_map(&reverse).unwrap();

            prop_assert_eq!(thumb_key(mtime_ms, &a), thumb_key(mtime_ms, &b));
        }

        /// Distinct modification times never share a key.
        #[test]
        fn distinct_mtimes_yield_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let options = GenerationOptions::new();
            prop_assert_ne!(thumb_key(a, &options), thumb_key(b, &options));
        }
    }
}

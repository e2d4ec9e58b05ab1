//! Entry classification.
//!
//! Callers decide whether an artifact kind is supported for an entry before
//! asking the cache for it. Thumbnails only make sense for image-like entries.

use serde::Serialize;
use std::path::Path;

/// Kind of a catalog entry.
///
/// Numeric codes are stable and shared with the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Undefined = 0,
    Directory = 1,
    Generic = 2,
    GeoImage = 3,
    GeoRaster = 4,
    PointCloud = 5,
    Image = 6,
    DroneDb = 7,
    Markdown = 8,
    Video = 9,
    GeoVideo = 10,
    Model = 11,
    Panorama = 12,
    GeoPanorama = 13,
    Vector = 14,
}

impl EntryType {
    /// All entry types in code order.
    pub const ALL: [EntryType; 15] = [
        Self::Undefined,
        Self::Directory,
        Self::Generic,
        Self::GeoImage,
        Self::GeoRaster,
        Self::PointCloud,
        Self::Image,
        Self::DroneDb,
        Self::Markdown,
        Self::Video,
        Self::GeoVideo,
        Self::Model,
        Self::Panorama,
        Self::GeoPanorama,
        Self::Vector,
    ];

    /// Numeric code of this entry type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up an entry type by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Human-readable name.
    pub fn as_human(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Directory => "Directory",
            Self::Generic => "Generic",
            Self::GeoImage => "GeoImage",
            Self::GeoRaster => "GeoRaster",
            Self::PointCloud => "PointCloud",
            Self::Image => "Image",
            Self::DroneDb => "DroneDB",
            Self::Markdown => "Markdown",
            Self::Video => "Video",
            Self::GeoVideo => "GeoVideo",
            Self::Model => "Model",
            Self::Panorama => "Panorama",
            Self::GeoPanorama => "GeoPanorama",
            Self::Vector => "Vector",
        }
    }

    /// Whether thumbnails can be generated for this entry type.
    pub fn thumbnail_supported(self) -> bool {
        matches!(self, Self::GeoImage | Self::GeoRaster | Self::Image)
    }

    /// Whether map tiles can be generated for this entry type.
    pub fn tiles_supported(self) -> bool {
        matches!(self, Self::GeoImage | Self::GeoRaster | Self::Image)
    }

    /// Whether this entry is a container of other entries.
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory | Self::DroneDb)
    }
}

/// Classifies filesystem entries into [`EntryType`]s.
pub trait EntryCatalog: Send + Sync {
    fn classify(&self, path: &Path) -> EntryType;
}

/// Catalog that classifies entries by file extension alone.
///
/// It cannot inspect geotags, so plain photos classify as [`EntryType::Image`]
/// and TIFFs as [`EntryType::GeoRaster`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionCatalog;

impl EntryCatalog for ExtensionCatalog {
    fn classify(&self, path: &Path) -> EntryType {
        if path.is_dir() {
            return if path.join(".ddb").is_dir() {
                EntryType::DroneDb
            } else {
                EntryType::Directory
            };
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return EntryType::Generic,
        };

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif" => EntryType::Image,
            "tif" | "tiff" => EntryType::GeoRaster,
            "las" | "laz" | "ply" | "e57" => EntryType::PointCloud,
            "md" | "markdown" => EntryType::Markdown,
            "mp4" | "mov" | "avi" | "mkv" | "webm" => EntryType::Video,
            "obj" | "glb" | "gltf" | "fbx" => EntryType::Model,
            "geojson" | "shp" | "kml" | "kmz" | "gpkg" | "dxf" => EntryType::Vector,
            _ => EntryType::Generic,
        }
    }
}

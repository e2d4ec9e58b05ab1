//! Raster renderer backed by the `image` crate.
//!
//! Thumbnails are downscaled to fit `max_dimension` (never upscaled).
//! Tiles treat the source as a square pyramid: zoom `z` splits the image
//! into a `2^z x 2^z` grid and tile `(x, y)` is that cell resampled to a
//! `max_dimension` square.

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{RenderError, RenderRequest, Renderer};
use crate::cache::BoxFuture;
use crate::key::{ArtifactKind, ImageFormat, TileCoord};

/// Resampling filter used for tiles.
pub const DEFAULT_TILE_FILTER: FilterType = FilterType::Triangle;

/// Renders thumbnails and tiles from raster images.
///
/// Decoding and encoding are CPU-bound and run on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct ImageRenderer {
    tile_filter: FilterType,
}

impl ImageRenderer {
    pub fn new() -> Self {
        Self {
            tile_filter: DEFAULT_TILE_FILTER,
        }
    }

    pub fn with_tile_filter(mut self, filter: FilterType) -> Self {
        self.tile_filter = filter;
        self
    }

    fn render_blocking(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, RenderError> {
        let img = decode(&request.source)?;

        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let out = match (request.kind, request.tile) {
            (ArtifactKind::Thumbnail, _) => thumbnail(&img, request.options.max_dimension),
            (ArtifactKind::Tile, Some(coord)) => {
                tile(&img, coord, request.options.max_dimension, self.tile_filter)
            }
            (ArtifactKind::Tile, None) => {
                return Err(RenderError::Failed(
                    "tile request without coordinate".to_string(),
                ))
            }
        };

        debug!(
            source = %request.source.display(),
            kind = %request.kind,
            width = out.width(),
            height = out.height(),
            format = %request.options.format,
            "Rendered artifact"
        );

        encode(&out, request.options.format)
    }
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ImageRenderer {
    fn render(
        &self,
        request: RenderRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Bytes, RenderError>> {
        let renderer = *self;
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            let data = tokio::task::spawn_blocking(move || {
                renderer.render_blocking(&request, &cancel)
            })
            .await
            .map_err(|e| RenderError::Failed(format!("render task failed: {}", e)))??;
            Ok(Bytes::from(data))
        })
    }
}

fn decode(path: &Path) -> Result<DynamicImage, RenderError> {
    let unreadable = |reason: String| RenderError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| unreadable(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| unreadable(e.to_string()))?;

    reader.decode().map_err(|e| match e {
        ImageError::IoError(io) => unreadable(io.to_string()),
        ImageError::Unsupported(u) => RenderError::UnsupportedFormat(u.to_string()),
        ImageError::Decoding(d) => RenderError::UnsupportedFormat(d.to_string()),
        other => RenderError::Failed(other.to_string()),
    })
}

fn thumbnail(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        img.clone()
    } else {
        img.thumbnail(max_dimension, max_dimension)
    }
}

fn tile(img: &DynamicImage, coord: TileCoord, size: u32, filter: FilterType) -> DynamicImage {
    let n = coord.tiles_per_axis();
    let (x0, x1) = cell_span(img.width(), coord.x, n);
    let (y0, y1) = cell_span(img.height(), coord.y, n);
    img.crop_imm(x0, y0, x1 - x0, y1 - y0)
        .resize_exact(size, size, filter)
}

/// Pixel span `[start, end)` of cell `index` when `extent` pixels are split into `cells`.
///
/// Always at least one pixel wide, so deep zooms on small images still
/// produce a (magnified) tile.
fn cell_span(extent: u32, index: u32, cells: u64) -> (u32, u32) {
    let extent64 = extent as u64;
    let start = (index as u64 * extent64 / cells).min(extent64.saturating_sub(1));
    let end = ((index as u64 + 1) * extent64).div_ceil(cells).min(extent64);
    let end = end.max(start + 1);
    (start as u32, end as u32)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Cursor::new(Vec::new());
    let result = match format {
        ImageFormat::Png => img.write_to(&mut buffer, image::ImageFormat::Png),
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buffer, image::ImageFormat::Jpeg)
        }
        ImageFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut buffer, image::ImageFormat::WebP),
    };
    result.map_err(|e| RenderError::Failed(format!("{} encoding failed: {}", format, e)))?;
    Ok(buffer.into_inner())
}

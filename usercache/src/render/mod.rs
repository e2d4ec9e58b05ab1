//! Renderer abstraction.
//!
//! The renderer turns a source file into encoded thumbnail or tile bytes.
//! It is the expensive step the cache exists to avoid repeating.

mod raster;

pub use raster::{ImageRenderer, DEFAULT_TILE_FILTER};

use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::BoxFuture;
use crate::key::{ArtifactKind, DerivedKey, RenderOptions, TileCoord};

/// What to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub kind: ArtifactKind,
    pub source: PathBuf,
    pub options: RenderOptions,
    /// Present for tiles only.
    pub tile: Option<TileCoord>,
}

impl From<&DerivedKey> for RenderRequest {
    fn from(derived: &DerivedKey) -> Self {
        Self {
            kind: derived.kind,
            source: derived.source.clone(),
            options: derived.options,
            tile: derived.tile,
        }
    }
}

/// Renderer failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Cannot read source '{}': {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    #[error("Render failed: {0}")]
    Failed(String),

    #[error("Render cancelled")]
    Cancelled,
}

/// Produces artifact bytes from a source file.
///
/// Implementations should check `cancel` at convenient points and return
/// [`RenderError::Cancelled`] once it fires; the cache only cancels when no
/// caller is waiting for the result any more.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        request: RenderRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Bytes, RenderError>>;
}

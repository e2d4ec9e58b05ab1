//! Error taxonomy for the artifact cache.
//!
//! Errors are `Clone` because a single generation result is broadcast to
//! every waiter that coalesced onto it.

use std::time::Duration;
use thiserror::Error;

use crate::render::RenderError;

/// Errors surfaced by the artifact cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Malformed or unknown generation parameters. No generation is attempted.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The source file was missing or unreadable when the renderer ran.
    #[error("Source unreadable '{path}': {reason}")]
    SourceUnreadable { path: String, reason: String },

    /// The renderer failed for any other reason (corrupt data, unsupported format).
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// The renderer did not finish within the configured timeout.
    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    /// A generated artifact could not be written to the store.
    ///
    /// Only returned by store operations; a facade request never fails
    /// because of it.
    #[error("Failed to persist artifact: {0}")]
    StorePersistence(String),

    /// Every waiter abandoned the request before the generation finished.
    #[error("Generation cancelled: all waiters abandoned the request")]
    Cancelled,

    /// Cache setup or maintenance I/O failed.
    #[error("Cache I/O error: {0}")]
    Io(String),
}

impl CacheError {
    /// True when there is nothing to show the user (the artifact could not be produced).
    pub fn is_nothing_to_show(&self) -> bool {
        matches!(
            self,
            Self::SourceUnreadable { .. } | Self::RenderFailure(_) | Self::RenderTimeout(_)
        )
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<RenderError> for CacheError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::SourceUnreadable { path, reason } => Self::SourceUnreadable {
                path: path.display().to_string(),
                reason,
            },
            RenderError::UnsupportedFormat(msg) => {
                Self::RenderFailure(format!("unsupported format: {}", msg))
            }
            RenderError::Timeout(after) => Self::RenderTimeout(after),
            RenderError::Failed(msg) => Self::RenderFailure(msg),
            RenderError::Cancelled => Self::Cancelled,
        }
    }
}

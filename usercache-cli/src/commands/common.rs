//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use usercache::entry::{EntryCatalog, EntryType, ExtensionCatalog};
use usercache::key::{ImageFormat, OPT_FORMAT, OPT_MAX_DIMENSION};
use usercache::service::{Artifact, ArtifactOrigin, Persistence};
use usercache::time::file_mtime_ms;

use crate::error::CliError;

/// Output format selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    /// Lossless PNG
    Png,
    /// JPEG (no alpha channel)
    Jpeg,
    /// WebP (lossless)
    Webp,
}

impl From<FormatArg> for ImageFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Webp => ImageFormat::Webp,
        }
    }
}

/// Build the JSON options object a host runtime would pass.
///
/// Options left unset fall back to the configured defaults inside the cache.
pub fn request_options(max_dimension: Option<u32>, format: Option<FormatArg>) -> Value {
    let mut options = Map::new();
    if let Some(max_dimension) = max_dimension {
        options.insert(OPT_MAX_DIMENSION.to_string(), json!(max_dimension));
    }
    if let Some(format) = format {
        options.insert(
            OPT_FORMAT.to_string(),
            json!(ImageFormat::from(format).as_str()),
        );
    }
    Value::Object(options)
}

/// Classify `path` and make sure `supported` holds for its entry type.
pub fn require_supported(
    path: &Path,
    supported: fn(EntryType) -> bool,
) -> Result<EntryType, CliError> {
    let entry_type = ExtensionCatalog.classify(path);
    if supported(entry_type) {
        Ok(entry_type)
    } else {
        Err(CliError::Unsupported {
            path: path.display().to_string(),
            entry_type,
        })
    }
}

/// Source modification time in epoch milliseconds, read from the filesystem.
pub fn source_mtime_ms(path: &Path) -> Result<i64, CliError> {
    file_mtime_ms(path).map_err(|error| CliError::SourceMetadata {
        path: path.display().to_string(),
        error,
    })
}

/// Default output path: `<source stem>.<suffix>.<extension>` in the current directory.
pub fn default_output_path(source: &Path, suffix: &str, format: ImageFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    PathBuf::from(format!("{}.{}.{}", stem, suffix, format.extension()))
}

/// Print a one-line summary of how an artifact was obtained.
pub fn print_artifact_summary(artifact: &Artifact, output: &Path) {
    let origin = match artifact.origin {
        ArtifactOrigin::CacheHit => "cache hit",
        ArtifactOrigin::Generated => "generated",
        ArtifactOrigin::Coalesced => "generated (shared)",
    };
    println!(
        "{} {} ({} bytes, {}) -> {}",
        artifact.kind,
        origin,
        artifact.len(),
        persistence_label(&artifact.persistence),
        output.display()
    );
}

fn persistence_label(persistence: &Persistence) -> String {
    match persistence {
        Persistence::Stored => "stored".to_string(),
        Persistence::NotAttempted => "from cache".to_string(),
        Persistence::Failed(reason) => format!("not cached: {}", reason),
    }
}

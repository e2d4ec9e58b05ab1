//! Thumbnail command.

use clap::Args;
use std::path::PathBuf;

use super::common::{
    default_output_path, print_artifact_summary, request_options, require_supported,
    source_mtime_ms, FormatArg,
};
use crate::error::CliError;
use crate::runner::CliRunner;
use usercache::entry::EntryType;
use usercache::key::ImageFormat;

#[derive(Debug, Args)]
pub struct ThumbArgs {
    /// Source image
    pub path: PathBuf,

    /// Longest edge of the thumbnail in pixels (config default if omitted)
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Output format (config default if omitted)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Output file (defaults to <stem>.thumb.<ext> in the current directory)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Get a thumbnail through the cache and write it out.
pub async fn run(runner: &CliRunner, args: ThumbArgs) -> Result<(), CliError> {
    require_supported(&args.path, EntryType::thumbnail_supported)?;
    let mtime_ms = source_mtime_ms(&args.path)?;

    let cache = runner.open_cache().await?;
    let options = request_options(args.max_dimension, args.format);
    let artifact = cache.get_thumbnail(&args.path, mtime_ms, &options).await?;

    let format = args
        .format
        .map(ImageFormat::from)
        .unwrap_or(runner.config().thumbnail.format);
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.path, "thumb", format));

    runner.write_output(&output, &artifact.data)?;
    print_artifact_summary(&artifact, &output);
    Ok(())
}

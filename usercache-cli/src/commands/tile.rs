//! Map tile command.

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
pub struct TileArgs {
    /// Source raster
    pub path: PathBuf,

    /// Zoom level
    pub z: u8,

    /// Tile column
    pub x: u32,

    /// Tile row
    pub y: u32,

    /// Tile edge length in pixels (config default if omitted)
    #[arg(long)]
    pub size: Option<u32>,

    /// Output format (config default if omitted)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Output file (defaults to <stem>.<z>-<x>-<y>.<ext> in the current directory)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Get a tile through the cache and write it out.
pub async fn run(runner: &CliRunner, args: TileArgs) -> Result<(), CliError> {
    require_supported(&args.path, EntryType::tiles_supported)?;
    let mtime_ms = source_mtime_ms(&args.path)?;

    let cache = runner.open_cache().await?;
    let options = request_options(args.size, args.format);
    let artifact = cache
        .get_tile(&args.path, mtime_ms, args.z, args.x, args.y, &options)
        .await?;

    let format = args
        .format
        .map(ImageFormat::from)
        .unwrap_or(runner.config().tile.format);
    let output = args.output.unwrap_or_else(|| {
        let suffix = format!("{}-{}-{}", args.z, args.x, args.y);
        default_output_path(&args.path, &suffix, format)
    });

    runner.write_output(&output, &artifact.data)?;
    print_artifact_summary(&artifact, &output);
    Ok(())
}

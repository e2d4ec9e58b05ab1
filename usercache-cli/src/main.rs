//! usercache CLI - Command-line interface
//!
//! Generates thumbnails and map tiles through the user-level cache and
//! manages the cache itself.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::cache::CacheAction;
use commands::classify::ClassifyArgs;
use commands::thumb::ThumbArgs;
use commands::tile::TileArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "usercache")]
#[command(version = usercache::VERSION)]
#[command(about = "Cached thumbnails and map tiles for local files", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.usercache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a thumbnail for an image, rendering it only on a cache miss
    Thumb(ThumbArgs),
    /// Get a z/x/y map tile of a raster, rendering it only on a cache miss
    Tile(TileArgs),
    /// Show the entry type of a file and which artifacts it supports
    Classify(ClassifyArgs),
    /// Manage the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(cli.config.as_deref(), cli.log_file)?;
    match cli.command {
        Commands::Thumb(args) => commands::thumb::run(&runner, args).await,
        Commands::Tile(args) => commands::tile::run(&runner, args).await,
        Commands::Cache { action } => commands::cache::run(&runner, action).await,
        Commands::Classify(args) => commands::classify::run(args),
    }
}

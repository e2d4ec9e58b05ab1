//! Cache management CLI commands.

use clap::Subcommand;
use usercache::cache::StoreStats;
use usercache::config::format_size;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear the cache, removing all cached thumbnails and tiles
    Clear,
    /// Show cache statistics
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Run a cache subcommand.
pub async fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    let location = match &runner.config().cache.directory {
        Some(dir) => dir.display().to_string(),
        None => "memory only".to_string(),
    };
    let cache = runner.open_cache().await?;

    match action {
        CacheAction::Clear => {
            let before = cache.stats();
            println!("Clearing cache at: {}", location);
            cache.clear().await.map_err(CliError::CacheClear)?;
            println!(
                "Deleted {} entries, freed {}",
                before.thumbnails.entry_count + before.tiles.entry_count,
                format_size(before.thumbnails.size_bytes + before.tiles.size_bytes)
            );
            Ok(())
        }
        CacheAction::Stats { json } => {
            let stats = cache.stats();
            if json {
                let report = serde_json::to_string_pretty(&stats)
                    .map_err(|e| CliError::Config(e.to_string()))?;
                println!("{}", report);
            } else {
                println!("Cache: {}", location);
                print_store("Thumbnails", &stats.thumbnails);
                print_store("Tiles", &stats.tiles);
            }
            Ok(())
        }
    }
}

fn print_store(label: &str, stats: &StoreStats) {
    println!("  {}:", label);
    println!("    Entries:  {}", stats.entry_count);
    println!(
        "    Size:     {} of {} ({:.1}%)",
        format_size(stats.size_bytes),
        format_size(stats.capacity_bytes),
        stats.utilization() * 100.0
    );
}

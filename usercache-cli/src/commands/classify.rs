//! Entry classification command.

use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use usercache::entry::{EntryCatalog, ExtensionCatalog};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// File or directory to classify
    pub path: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ClassifyArgs) -> Result<(), CliError> {
    let entry_type = ExtensionCatalog.classify(&args.path);

    if args.json {
        let report = json!({
            "path": args.path.display().to_string(),
            "type": entry_type,
            "code": entry_type.code(),
            "thumbnail": entry_type.thumbnail_supported(),
            "tiles": entry_type.tiles_supported(),
        });
        println!("{}", report);
    } else {
        println!("{}: {} ({})", args.path.display(), entry_type.as_human(), entry_type.code());
        println!("  Thumbnails: {}", yes_no(entry_type.thumbnail_supported()));
        println!("  Tiles:      {}", yes_no(entry_type.tiles_supported()));
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

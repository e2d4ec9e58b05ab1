//! User configuration.
//!
//! `~/.usercache/config.ini` holds the cache location, per-kind capacities,
//! per-kind render defaults, the render timeout and the log file.
//!
//! # Example
//!
//! ```no_run
//! use usercache::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! println!("thumbnails up to {} bytes", config.cache.thumbnail_capacity);
//! # Ok::<(), usercache::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, LoggingSettings, RenderSettings, ThumbnailSettings, TileSettings,
};
pub use size::{format_size, parse_size, SizeParseError};

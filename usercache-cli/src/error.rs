//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use usercache::config::ConfigFileError;
use usercache::entry::EntryType;
use usercache::CacheError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to open the cache stores
    CacheOpen(CacheError),
    /// Failed to produce a thumbnail or tile
    Generate(CacheError),
    /// The entry type has no artifact of the requested kind
    Unsupported { path: String, entry_type: EntryType },
    /// Failed to read the source file's metadata
    SourceMetadata { path: String, error: std::io::Error },
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Failed to clear the cache
    CacheClear(CacheError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Generate(e) if e.is_nothing_to_show() => {
                eprintln!();
                eprintln!("The source could not be rendered. Check that:");
                eprintln!("  1. The file exists and is readable");
                eprintln!("  2. It is a PNG, JPEG, WebP or TIFF image");
            }
            CliError::CacheOpen(_) => {
                eprintln!();
                eprintln!("Check the [cache] directory setting in your config.ini,");
                eprintln!("or leave it empty to keep the cache in memory.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::CacheOpen(e) => write!(f, "Failed to open cache: {}", e),
            CliError::Generate(e) => write!(f, "{}", e),
            CliError::Unsupported { path, entry_type } => write!(
                f,
                "'{}' is a {} entry, which has no artifact of this kind",
                path,
                entry_type.as_human()
            ),
            CliError::SourceMetadata { path, error } => {
                write!(f, "Cannot read '{}': {}", path, error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::CacheClear(e) => write!(f, "Failed to clear cache: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::CacheOpen(e) => Some(e),
            CliError::Generate(e) => Some(e),
            CliError::CacheClear(e) => Some(e),
            CliError::SourceMetadata { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Generate(e)
    }
}

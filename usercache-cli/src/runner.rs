//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, cache creation and
//! output writing to reduce duplication across command handlers.

use crate::error::CliError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use usercache::config::ConfigFile;
use usercache::logging::{init_logging, LoggingGuard};
use usercache::render::ImageRenderer;
use usercache::service::{UserCache, UserCacheConfig};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// `config_path` overrides `~/.usercache/config.ini`; `log_file`
    /// overrides the `[logging] file` setting.
    pub fn new(config_path: Option<&Path>, log_file: Option<PathBuf>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let log_file = log_file.or_else(|| config.logging.file.clone());
        let logging_guard = init_logging(log_file.as_deref())
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        info!(version = usercache::VERSION, "usercache starting");

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Open the user cache described by the config, rendering with [`ImageRenderer`].
    pub async fn open_cache(&self) -> Result<UserCache, CliError> {
        let config = UserCacheConfig::from_config_file(&self.config);
        UserCache::open(config, Arc::new(ImageRenderer::new()))
            .await
            .map_err(CliError::CacheOpen)
    }

    /// Write artifact bytes to `path`.
    pub fn write_output(&self, path: &Path, data: &[u8]) -> Result<(), CliError> {
        std::fs::write(path, data).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        })?;
        info!(path = %path.display(), bytes = data.len(), "Wrote artifact");
        Ok(())
    }
}

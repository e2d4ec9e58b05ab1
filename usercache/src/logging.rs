//! Logging infrastructure for usercache.
//!
//! Provides structured logging to stderr and, optionally, to a log file:
//! - The log file is cleared on session start
//! - stderr keeps stdout free for command output
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging.
///
/// With `log_file` set, its parent directory is created, the previous
/// contents are cleared, and events are written there (without ANSI colors)
/// in addition to stderr.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let (subscriber, file_guard) = build_subscriber(log_file)?;
    subscriber.init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Assemble the filter, the optional file layer and the stderr layer.
fn build_subscriber(
    log_file: Option<&Path>,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>), io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_guard) = match log_file {
        Some(log_path) => {
            let (log_dir, file_name) = prepare_log_file(log_path)?;
            let file_appender = tracing_appender::rolling::never(log_dir, file_name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer);

    Ok((subscriber, file_guard))
}

/// Create the log directory and truncate the log file.
///
/// Returns the directory and file name the appender should use.
fn prepare_log_file(log_path: &Path) -> Result<(&Path, &std::ffi::OsStr), io::Error> {
    let file_name = log_path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path has no file name: {}", log_path.display()),
        )
    })?;
    let log_dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(log_dir)?;
    fs::write(log_path, "")?;

    Ok((log_dir, file_name))
}

//! Logging setup.
//!
//! Every run logs to the console and to its own file in the log folder,
//! named after the Unix time the run started. `RUST_LOG` overrides the
//! level selected on the command line.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix of per-run log file names.
pub const LOG_FILE_PREFIX: &str = "d42_fs_sync";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot create log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("logging already initialized: {0}")]
    Init(String),
}

/// Default filter for the command-line flags. `quiet` wins over `debug`.
#[must_use]
pub fn level_for(debug: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if debug {
        "debug"
    } else {
        "info"
    }
}

/// Path of the log file for a run started at `started_at` (Unix seconds).
#[must_use]
pub fn log_file_path(folder: &Path, started_at: i64) -> PathBuf {
    folder.join(format!("{LOG_FILE_PREFIX}_{started_at}.log"))
}

/// Create the log file for a run.
pub fn create_log_file(folder: &Path, started_at: i64) -> Result<(PathBuf, File), LoggingError> {
    let path = log_file_path(folder, started_at);
    let file = File::create(&path).map_err(|source| LoggingError::File {
        path: path.display().to_string(),
        source,
    })?;
    Ok((path, file))
}

/// Install the console and file layers and return the log file path.
pub fn init_logging(folder: &Path, level: &str) -> Result<PathBuf, LoggingError> {
    let (path, file) = create_log_file(folder, chrono::Utc::now().timestamp())?;

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let console_layer = fmt::layer().with_target(false).with_writer(io::stdout);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(path = %path.display(), level = %level, "Logging initialized");
    Ok(path)
}

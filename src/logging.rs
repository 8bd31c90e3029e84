//! File logging for the terminal host.
//!
//! The terminal belongs to the UI, so log lines only ever go to
//! `<state dir>/logs/bellwork.log`. The filter is read from `BELLWORK_LOG`
//! and defaults to `info`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::app_dirs::AppDirs;

pub const LOG_ENV: &str = "BELLWORK_LOG";
pub const LOG_FILE: &str = "bellwork.log";

/// Keep alive for the program lifetime; dropping it flushes the writer
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber writing to `log_dir/bellwork.log`.
pub fn init_logging(log_dir: &Path) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Logging in the default state directory, or none at all if that fails
pub fn init_default() -> Option<LoggingGuard> {
    // no subscriber to report a failure to, and stderr belongs to the TUI
    init_logging(&AppDirs::log_dir()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        // a global subscriber may already be installed by another test
        let _ = init_logging(&log_dir);
        assert!(log_dir.is_dir());
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        assert!(init_logging(&file.join("logs")).is_err());
    }
}

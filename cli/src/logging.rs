//! Logging setup for the command-line tool

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Directory for daily rolling log files; console only when unset
pub const LOG_DIR_ENV: &str = "ASTROPLANNER_LOG_DIR";

/// Install the global subscriber.
///
/// Console output goes to stderr so stdout stays clean for JSON. The
/// returned guard must live until exit or buffered file lines are lost.
pub fn init(log_directory: Option<PathBuf>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    if let Some(log_path) = log_directory {
        if let Err(e) = std::fs::create_dir_all(&log_path) {
            eprintln!("Failed to create log directory {}: {}", log_path.display(), e);
            return init(None);
        }

        let file_appender = tracing_appender::rolling::daily(&log_path, "astroplanner.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::debug!("Logging to {}", log_path.display());
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        None
    }
}

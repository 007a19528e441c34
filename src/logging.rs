use std::path::Path;

use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, ThaiMtError};

pub const LOG_FILE_NAME: &str = "thaimt.log";

/// Setup logging to both console and a daily-rotated file under `log_dir`.
///
/// Keep the returned guard alive; buffered file output is flushed when it drops.
pub fn init_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ThaiMtError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized - level: {}, file: {}",
          log_level, log_dir.join(LOG_FILE_NAME).display());

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_creates_log_dir_and_rejects_second_init() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("log");

        let _guard = init_logging(true, &log_dir).unwrap();
        assert!(log_dir.is_dir());

        // The global subscriber can only be installed once per process
        assert!(matches!(init_logging(false, &log_dir), Err(ThaiMtError::Config(_))));
    }
}

//! Tracing setup: console output plus a daily-rolling log file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogConfig;
use crate::error::ConfigError;

/// Log file name prefix inside the log directory.
pub const LOG_FILE_PREFIX: &str = "case-notifier.log";

/// Filter directive when `RUST_LOG` is unset.
pub fn default_directive(config: &LogConfig) -> &str {
    if config.debug_logs {
        "debug"
    } else {
        &config.min_level
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, ConfigError> {
    std::fs::create_dir_all(&config.dir)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let file_appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| ConfigError::InvalidValue {
            key: "logging".to_string(),
            message: format!("subscriber already installed: {e}"),
        })?;

    Ok(guard)
}

//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;

const LOG_FILE_NAME: &str = "devbytes.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. When `config.dir` is set,
/// events are also written to a daily-rotated file; keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = || {
    EnvFilter::try_from_default_env()
      .or_else(|_| EnvFilter::try_new(&config.level))
      .map_err(|e| eyre!("Invalid log level '{}': {}", config.level, e))
  };

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .with_filter(filter()?);

  let (file_layer, guard) = match &config.dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter()?);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(stderr_layer)
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "pitwall.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. With a log directory set,
/// output goes to a daily-rotated file and the returned guard must be held
/// until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> color_eyre::Result<Option<WorkerGuard>> {
  let filter = env_filter(&config.level);

  match config.directory.as_deref() {
    Some(dir) => {
      let (writer, guard) = file_writer(dir)?;
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
      Ok(None)
    }
  }
}

fn env_filter(level: &str) -> EnvFilter {
  EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level))
    .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(
  dir: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
  std::fs::create_dir_all(dir)?;
  let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
  Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_writer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let (_writer, _guard) = file_writer(&logs).unwrap();
    assert!(logs.is_dir());
  }
}

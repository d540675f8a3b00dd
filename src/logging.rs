use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_ENV: &str = "POKEDEX_LOG";
const LOG_FILE_PREFIX: &str = "pokedex.log";

/// Initialize a logger that writes to a daily log file in the data directory.
///
/// Stdout carries command output, so nothing is logged to the terminal.
/// The level comes from `POKEDEX_LOG` (default `warn`). Keep the returned
/// guard alive for the life of the program so buffered lines get flushed.
pub fn init() -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(writer)
    .with_filter(filter);

  tracing_subscriber::registry()
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("pokedex").join("logs"))
}

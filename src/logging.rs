//! Tracing subscriber setup

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LoggingConfig, data_dir, log_path};

/// Installs the global subscriber
///
/// `RUST_LOG` overrides the configured level. Output goes to the log file under the
/// data directory unless `stderr` is set. The returned guard must be held until exit
/// so buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = if config.stderr {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        let dir = data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
        let path = log_path();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_appender::non_blocking(file)
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer).with_ansi(false))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .try_init(),
    };
    result.context("failed to install tracing subscriber")?;

    Ok(guard)
}

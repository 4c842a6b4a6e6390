//! Tracing subscriber setup for the binary.
//!
//! Events always go to stdout in the configured format. With a log file
//! configured they are also appended to it, without ANSI colours, through
//! a background writer.

use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{anyhow, Context};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogFormat;

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// The returned guard flushes the log file when dropped; keep it alive
/// for the life of the process.
pub fn init(
    default_level: &str,
    format: LogFormat,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    let stdout = match format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
    };

    let (file, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = fmt::layer().with_ansi(false).with_target(true).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

/// Open `path` for appending, creating it and its parent directories.
fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

//! Subscriber setup: console (pretty or JSON) plus an optional JSON log file.

use crate::cli::FILE_GUARD;
use std::io;
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`. Console output goes to stderr so stdout
/// stays reserved for reports and diagnostic lines.
pub fn init(level: &str, json: bool, cfg: &vbt_config::Logging) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .boxed()
    };

    let file = match cfg.file.as_deref() {
        Some(path) => {
            let appender = rolling_appender(Path::new(path), cfg.rotation.as_deref())?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))
}

fn rolling_appender(
    path: &Path,
    rotation: Option<&str>,
) -> eyre::Result<tracing_appender::rolling::RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
    let appender = match rotation.unwrap_or("never") {
        "daily" => tracing_appender::rolling::daily(dir, name),
        "hourly" => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    };
    Ok(appender)
}

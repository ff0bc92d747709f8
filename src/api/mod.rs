//! Recorder API
//!
//! The recorder service and its outbound sink, plus process-level setup
//! shared by the binaries.

pub mod recorder_api;
pub mod sink;

pub use recorder_api::{Recorder, RecorderError, StopReport};
pub use sink::{BroadcastSink, NullSink, RecorderSink};

#[cfg(not(debug_assertions))]
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::level_filters::LevelFilter;

#[cfg(not(debug_assertions))]
static LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Install the global tracing subscriber.
///
/// Debug builds log to stderr. Release builds log to a daily file under
/// `<storage>/logs`. Stdout is never used; it carries the message channel.
#[allow(unused_variables)]
pub fn init_logging(storage_path: Option<&Path>) -> anyhow::Result<()> {
    let level = resolve_log_level();

    #[cfg(debug_assertions)]
    {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init();
    }

    #[cfg(not(debug_assertions))]
    {
        let log_dir = storage_path
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| std::path::PathBuf::from("logs"));
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create log directory {}: {}",
                log_dir.display(),
                e
            )
        })?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "apirecorder");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // A second init keeps the first guard and subscriber.
        let _ = LOG_GUARD.set(guard);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(non_blocking)
            .try_init();
    }

    tracing::info!("API recorder core initialized v{}", get_version());
    Ok(())
}

fn resolve_log_level() -> LevelFilter {
    match std::env::var("RUST_LOG") {
        Ok(val) => match val.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::INFO,
        },
        Err(_) => LevelFilter::INFO,
    }
}

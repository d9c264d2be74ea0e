//! Logging setup for the `checkin` binary.
//!
//! Logs go to stderr so stdout stays machine-readable. Set
//! `CHECKIN_DEBUG_LOG=1` for debug output, otherwise `RUST_LOG` applies
//! (default `info`). When `CHECKIN_LOG_DIR` is set, a daily rolling file is
//! written there as well.

use std::env;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEBUG_ENV: &str = "CHECKIN_DEBUG_LOG";
pub const LOG_DIR_ENV: &str = "CHECKIN_LOG_DIR";
const LOG_FILE_PREFIX: &str = "checkin.log";

/// Installs the global subscriber. Hold the returned guard until exit so
/// buffered file output is flushed.
pub fn init() -> Option<WorkerGuard> {
    let filter = if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    if result.is_err() {
        // Already initialized (e.g. in tests); keep the existing subscriber.
        return None;
    }
    guard
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn log_dir() -> Option<PathBuf> {
    env::var_os(LOG_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

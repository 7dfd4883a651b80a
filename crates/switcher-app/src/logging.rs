//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::paths::{self, LOG_FILE_PREFIX};

/// Crates whose events the default filter admits at the configured level.
const LOG_TARGETS: &[&str] = &[
    "proxy_switcher",
    "switcher_app",
    "switcher_core",
    "switcher_system",
];

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Rolling files only.
    File,
    /// Rolling files and stdout.
    FileAndConsole,
    /// Stdout only.
    Console,
}

/// Builds the default filter directive for `level`.
pub fn default_directive(level: &str) -> String {
    let mut directive: String = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={},", target, level))
        .collect();
    directive.push_str("warn");
    directive
}

/// Initialize logging with file rotation.
///
/// `RUST_LOG` takes precedence over `level`. The returned guard must be held
/// for the process lifetime to keep the file writer flushing.
pub fn init_logging(level: &str, target: LogTarget) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    if target == LogTarget::Console {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    }

    if let Some(log_dir) = paths::logs_dir() {
        if let Some((non_blocking, guard)) = file_writer(&log_dir) {
            if target == LogTarget::FileAndConsole {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();
            }

            tracing::info!("Logging to {:?}", log_dir);
            return Some(guard);
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

fn file_writer(
    log_dir: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir).ok()?;

    // Rotates daily, keeps the five newest files
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .ok()?;

    Some(tracing_appender::non_blocking(appender))
}

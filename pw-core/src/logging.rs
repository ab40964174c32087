//! Structured logging setup using the `tracing` ecosystem.
//!
//! Driven by the `[logging]` section of the application config: level,
//! file output format, and rotation directory. Console output goes to
//! stderr so command output on stdout stays pipeable.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::rolling;

use crate::config::LoggingConfig;
use crate::error::PwResult;

/// Initialize the global tracing subscriber from the logging config.
///
/// Sets up:
/// - Console output (stderr) with colors
/// - File output in `log_dir` with daily rotation, plain text or JSON per
///   `config.json_output`
/// - Level filtering from `config.level`
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> PwResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "poolwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    if config.json_output {
        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(build_filter(&config.level))
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(build_filter(&config.level))
            .with(console_layer)
            .with(file_layer)
            .init();
    }

    tracing::info!(level = %config.level, dir = %log_dir.display(), "logging initialized");

    Ok(LogGuard { _guard: guard })
}

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize a console-only (stderr) logger for quick local commands and
/// tests. Subsequent calls are no-ops.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .try_init();
}

/// Filter from a user-supplied level string; unparseable input degrades to
/// `info`.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

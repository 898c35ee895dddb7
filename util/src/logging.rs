use crate::config;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global `tracing` subscriber.
///
/// Events always go to a daily-rolling file under `config::log_dir()`; a stdout
/// layer is added when `LOG_TO_STDOUT=true`. The filter is taken from `LOG_LEVEL`
/// when it parses, falling back to the configured default directive.
///
/// Keep the returned guard alive for the lifetime of the process, dropping it
/// flushes and stops the background writer.
pub fn init_logging() -> WorkerGuard {
    let log_dir = config::log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, config::log_file());
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true);

    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(config::log_level()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    // `try_init` so a second call (tests, embedded use) is a no-op instead of a panic.
    if config::log_to_stdout() {
        registry.with(stdout_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    guard
}

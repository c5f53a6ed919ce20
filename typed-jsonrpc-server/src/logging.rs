use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "typed_jsonrpc_core=debug,typed_jsonrpc_server=debug,warn";

/// Initialize logging to stderr plus a daily rolling file under `log_dir`.
///
/// Console output is human readable; the file gets one JSON object per event.
/// Buffered file output is flushed when the returned guard is dropped, so keep
/// it alive for as long as the process logs.
pub fn init_logging(log_dir: impl AsRef<Path>, log_prefix: &str) -> anyhow::Result<WorkerGuard> {
    let log_dir_path = log_dir.as_ref();
    std::fs::create_dir_all(log_dir_path)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_prefix)
        .build(log_dir_path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging initialized with file output to {:?}", log_dir_path);
    Ok(guard)
}

/// Initialize console-only logging for tests. Safe to call more than once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("typed_jsonrpc_core=trace,typed_jsonrpc_server=trace,debug")),
        )
        .with_test_writer()
        .try_init();
}

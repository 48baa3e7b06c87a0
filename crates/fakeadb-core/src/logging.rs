//! Logging configuration using tracing

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable that overrides the log filter
pub const LOG_ENV: &str = "FAKEADB_LOG";

const DEFAULT_FILTER: &str = "fakeadb=info,fakeadb_server=info,warn";
const LOG_FILE_NAME: &str = "fakeadb.log";

/// Initialize file logging
///
/// Logs are written to `<data_local_dir>/fake-adb-server/logs/` unless
/// `log_dir` is given. Log level is controlled by the `FAKEADB_LOG`
/// environment variable.
///
/// # Examples
/// ```bash
/// FAKEADB_LOG=debug fakeadb --port 5037
/// FAKEADB_LOG=fakeadb_server=trace fakeadb
/// ```
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_directory(),
    };
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("Fake ADB server logging to {}", log_dir.display());

    Ok(())
}

/// Initialize logging to stderr, for interactive runs
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string())),
        )
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Get the default log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("fake-adb-server").join("logs")
}

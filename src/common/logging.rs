//! Logging and tracing configuration
//!
//! The CLI logs to stderr and, when a data directory is available, to a
//! run log file so results of unattended runs can be inspected later.

use std::path::PathBuf;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Initialize tracing for the CLI (stderr + run log file)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for the duration of the program.
pub fn init_cli(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = match paths::ensure_log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            None
        }
    };

    let (subscriber, guard) = subscriber(verbose, log_dir);
    subscriber.init();
    guard
}

/// Build the CLI subscriber, with a run log layer when `log_dir` is set
fn subscriber(
    verbose: bool,
    log_dir: Option<PathBuf>,
) -> (impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let default_filter = if verbose {
        "scenario=debug,warn"
    } else {
        "scenario=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, paths::RUN_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            // File logging with full details
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer);

    (subscriber, guard)
}

/// Get the path to the run log file
pub fn run_log_path() -> Option<PathBuf> {
    paths::run_log_path()
}

/// Truncate the run log file
pub fn truncate_run_log() -> std::io::Result<()> {
    if let Some(path) = run_log_path() {
        if path.exists() {
            std::fs::write(&path, "")?;
        }
    }
    Ok(())
}

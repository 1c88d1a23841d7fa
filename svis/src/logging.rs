//! Terminal and file logging setup.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::SvisError;

/// Logger thread handles, which must be kept alive for as long as the
/// logging targets will be used. Flushed automatically when dropped.
pub struct LoggingGuards {
    _stdout: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// Set up terminal logging, plus file logging when `log_file` is given.
///
/// The filter honors `RUST_LOG` and defaults to `info`.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuards, SvisError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| SvisError::Logging(format!("failed to set up env filter: {e}")))?;

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::rfc_3339())
        .with_writer(stdout_writer)
        .with_target(false);

    let mut file_guard = None;
    let file_layer = match log_file {
        Some(path) => {
            let logfile = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| SvisError::Logging(format!("failed to open log file: {e}")))?;
            let (file_writer, guard) = tracing_appender::non_blocking(logfile);
            file_guard = Some(guard);
            Some(
                fmt::layer()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_writer(file_writer)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SvisError::Logging(format!("failed to initialize logging: {e}")))?;

    Ok(LoggingGuards {
        _stdout: stdout_guard,
        _file: file_guard,
    })
}

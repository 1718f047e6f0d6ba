//! Log output for the ledger service
//!
//! Text mode writes to the rolling file and to stdout; JSON mode writes
//! structured records to the file only.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LogRotation, LoggingConfig};

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config));

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => {
            let file_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(writer)
                .with_ansi(false);
            registry.with(file_layer).init();
        }
        LogFormat::Text => {
            let file_layer = fmt::layer()
                .with_target(false)
                .with_writer(writer)
                .with_ansi(false);
            let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
            registry.with(file_layer).with(stdout_layer).init();
        }
    }

    guard
}

fn file_appender(config: &LoggingConfig) -> RollingFileAppender {
    match config.rotation {
        LogRotation::Hourly => rolling::hourly(&config.dir, &config.file),
        LogRotation::Daily => rolling::daily(&config.dir, &config.file),
        LogRotation::Never => rolling::never(&config.dir, &config.file),
    }
}

/// sqlx logs every statement at info; keep it out of the ledger log
fn filter_directive(config: &LoggingConfig) -> String {
    format!("{},sqlx=warn", config.level)
}

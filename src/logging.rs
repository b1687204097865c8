//! Tracing subscriber setup for binaries and hosts.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::{NotifyError, Result};
use crate::notify_dirs;

/// Install the global subscriber: stderr always, plus a daily rolling file
/// when `log_to_file` is set. `RUST_LOG` wins over the configured filter.
///
/// Keep the returned guard alive for the life of the process so buffered
/// file output is flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| NotifyError::Config(format!("invalid log filter: {e}")))?;

    let (file_layer, guard) = if config.log_to_file {
        let appender =
            tracing_appender::rolling::daily(notify_dirs::logs_dir(), "deferred-notify.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| NotifyError::Config(format!("cannot install log subscriber: {e}")))?;

    Ok(guard)
}

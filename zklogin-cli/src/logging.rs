use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zklogin_core::logger::{set_logger, LogLevel, Logger};

/// Re-emits session core records as `tracing` events.
struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "zklogin_core", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "zklogin_core", "{message}"),
            LogLevel::Info => tracing::info!(target: "zklogin_core", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "zklogin_core", "{message}"),
            LogLevel::Error => tracing::error!(target: "zklogin_core", "{message}"),
        }
    }
}

/// Installs a stderr subscriber filtered by `RUST_LOG` (default `warn`) and bridges the core's
/// `log` records into it.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    set_logger(Arc::new(TracingLogger));
}

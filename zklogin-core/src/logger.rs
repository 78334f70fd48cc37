//! Routing of session log records to the host.
//!
//! Everything in this crate logs through the `log` facade. A host that already installs a `log`
//! implementation needs nothing from here. Otherwise it hands a [`Logger`] to [`set_logger`] and
//! receives every record from this crate plus warnings and errors from its HTTP stack.
//!
//! ```rust
//! use std::sync::Arc;
//! use zklogin_core::logger::{set_logger, LogLevel, Logger};
//!
//! struct Stderr;
//!
//! impl Logger for Stderr {
//!     fn log(&self, level: LogLevel, message: String) {
//!         eprintln!("{level:?} {message}");
//!     }
//! }
//!
//! set_logger(Arc::new(Stderr));
//! ```

use std::sync::{Arc, OnceLock};

/// Sink for session log records.
pub trait Logger: Send + Sync {
    /// Receives one formatted record.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a record, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Step-by-step detail.
    Trace,
    /// Phase transitions and request targets.
    Debug,
    /// Milestones such as a committed key or an executed transaction.
    Info,
    /// Recoverable problems: discarded state, failed transitions.
    Warn,
    /// Failures the session cannot recover from.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warn,
            log::Level::Error => Self::Error,
        }
    }
}

static HOST_LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log` backend handing records to the installed host logger.
struct Bridge;

impl Bridge {
    /// Records below `Info` are only kept when they come from this crate.
    fn accepts(metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info || metadata.target().starts_with("zklogin")
    }
}

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Self::accepts(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !Self::accepts(record.metadata()) {
            return;
        }
        match HOST_LOGGER.get() {
            Some(host) => host.log(record.level().into(), record.args().to_string()),
            None => eprintln!("[zklogin] {}", record.args()),
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the receiver of this crate's records.
///
/// The first call wins. Later calls, or a `log` backend installed elsewhere, leave the existing
/// setup in place and print a notice to stderr.
pub fn set_logger(logger: Arc<dyn Logger>) {
    static BRIDGE: Bridge = Bridge;

    if HOST_LOGGER.set(logger).is_err() {
        eprintln!("zklogin: logger already installed");
        return;
    }
    match log::set_logger(&BRIDGE) {
        Ok(()) => log::set_max_level(log::LevelFilter::Trace),
        Err(err) => eprintln!("zklogin: cannot install log bridge: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(LogLevel, String)>>);

    impl Logger for Capture {
        fn log(&self, level: LogLevel, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    #[test]
    fn test_records_are_forwarded_and_foreign_debug_is_dropped() {
        let capture = Arc::new(Capture::default());
        set_logger(capture.clone());

        log::warn!("from zklogin");
        log::logger().log(
            &log::Record::builder()
                .level(log::Level::Debug)
                .target("hyper::client")
                .args(format_args!("noise"))
                .build(),
        );
        log::logger().log(
            &log::Record::builder()
                .level(log::Level::Warn)
                .target("reqwest::connect")
                .args(format_args!("tls handshake failed"))
                .build(),
        );

        let seen = capture.0.lock().unwrap();
        assert!(seen
            .iter()
            .any(|(level, msg)| *level == LogLevel::Warn && msg == "from zklogin"));
        assert!(seen.iter().any(|(_, msg)| msg == "tls handshake failed"));
        assert!(!seen.iter().any(|(_, msg)| msg == "noise"));
    }

    #[test]
    fn test_levels_order_from_most_verbose() {
        assert!(LogLevel::Trace < LogLevel::Error);
        assert_eq!(LogLevel::from(log::Level::Info), LogLevel::Info);
    }
}

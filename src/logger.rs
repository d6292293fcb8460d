//! Diagnostics sink for client events.

use std::fmt;

/// Receives debug and error events from the request pipeline.
///
/// Events are observational; nothing a logger does changes how a call
/// proceeds. The default is [`NoopLogger`].
pub trait Logger: Send + Sync {
    fn debug(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
}

/// Forwards events to `tracing` under the `manapool_http` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "manapool_http", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "manapool_http", "{}", args);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        fmt,
        sync::{Mutex, PoisonError},
    };

    use super::{Logger, NoopLogger};

    /// Records every event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingLogger {
        pub(crate) debug: Mutex<Vec<String>>,
        pub(crate) error: Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn debug(&self, args: fmt::Arguments<'_>) {
            self.debug
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(args.to_string());
        }

        fn error(&self, args: fmt::Arguments<'_>) {
            self.error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(args.to_string());
        }
    }

    #[test]
    fn recording_logger_formats_arguments() {
        let logger = RecordingLogger::default();
        logger.debug(format_args!("attempt {} of {}", 1, 3));
        logger.error(format_args!("status {}", 500));

        assert_eq!(logger.debug.lock().unwrap().as_slice(), ["attempt 1 of 3"]);
        assert_eq!(logger.error.lock().unwrap().as_slice(), ["status 500"]);
    }

    #[test]
    fn noop_logger_accepts_events() {
        let logger: &dyn Logger = &NoopLogger;
        logger.debug(format_args!("ignored {}", 1));
        logger.error(format_args!("ignored {}", 2));
    }
}

//! Pluggable sink for backup progress messages.

use std::fmt;

/// Receiver of operational backup events.
///
/// Implementations must be cheap and non-blocking enough to call from the
/// backup task; calls are made synchronously and in order.
pub trait BackupLogger: Send + Sync {
    /// Informational message.
    fn info(&self, args: fmt::Arguments<'_>);

    /// Recoverable problem, such as an inaccessible path.
    fn warning(&self, args: fmt::Arguments<'_>);

    /// Failed operation, such as an upload error.
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Default logger: one line per message on standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLogger;

impl BackupLogger for StdoutLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        println!("{}", args);
    }

    fn warning(&self, args: fmt::Arguments<'_>) {
        println!("{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        println!("{}", args);
    }
}

/// Forwards messages to `tracing` under the `drivekeeper::backup` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl BackupLogger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "drivekeeper::backup", "{}", args);
    }

    fn warning(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "drivekeeper::backup", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "drivekeeper::backup", "{}", args);
    }
}

//! Error types for proc-warden.

use thiserror::Error;

/// Main error type for proc-warden operations.
///
/// The engine never lets one of these escape to the host as a panic: every
/// public [`ProcessEngine`](crate::ProcessEngine) operation converts failures
/// into a `false` return plus a queryable last-error message.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Start was called while a process is still running.
    #[error("process is already running")]
    AlreadyRunning,

    /// A control operation requires a running process.
    #[error("process is not running")]
    NotRunning,

    /// A configuration setter was called after the process started.
    #[error("process is running")]
    ProcessIsRunning,

    /// Launching the OS process failed.
    #[error("failed to launch process: {0}")]
    LaunchFailed(String),

    /// Waiting on the native process failed.
    #[error("wait for exit failed: {0}")]
    WaitFailed(String),

    /// Input was written without standard input being redirected.
    #[error("process input is not redirected")]
    InputNotRedirected,

    /// A name lookup (encoding, priority class) did not match the accepted set.
    #[error("unsupported {kind} name: {value}")]
    UnsupportedValue {
        /// What kind of value was looked up ("encoding", "priority class").
        kind: &'static str,
        /// The rejected name.
        value: String,
    },

    /// The process exceeded its timeout and was terminated.
    #[error("process timed out after {0} ms")]
    TimedOut(u64),

    /// Processor affinity could not be applied.
    #[error("processor affinity error: {0}")]
    Affinity(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// A background task channel closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for proc-warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

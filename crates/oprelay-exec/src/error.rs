//! Error types for oprelay-exec

use std::time::Duration;

use thiserror::Error;

/// Errors raised by channel transports and connection resolution
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// Failed to reach the remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Key material could not be resolved
    #[error("key error: {0}")]
    KeyError(String),

    /// Connection descriptor is missing or has invalid fields
    #[error("malformed connection descriptor: {0}")]
    MalformedDescriptor(String),

    /// Local process could not be started
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    Io(String),

    /// Channel was used after being closed
    #[error("not connected")]
    NotConnected,

    /// Execution was cancelled by the caller
    #[error("execution cancelled")]
    Cancelled,

    /// Execution exceeded its deadline
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Deadline that was exceeded
        timeout: Duration,
    },
}

impl ChannelError {
    /// Whether the error came from a deliberate termination (caller cancel
    /// or deadline) rather than a transport fault
    #[must_use]
    pub fn is_interruption(&self) -> bool {
        matches!(self, ChannelError::Cancelled | ChannelError::Timeout { .. })
    }
}

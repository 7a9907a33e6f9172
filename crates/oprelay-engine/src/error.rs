//! Engine failure taxonomy

use thiserror::Error;

use oprelay_api::Platform;
use oprelay_exec::ChannelError;

/// Failures surfaced to the caller of the engine.
///
/// Failures are never retried internally; transient network errors are the
/// caller's responsibility.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Connection resolution, authentication, or transport fault
    #[error("connection error: {0}")]
    Connection(ChannelError),

    /// Command ran to completion with a nonzero exit code. Carries the
    /// captured output so operators can diagnose the remote script's
    /// behavior, not just the code.
    #[error("command failed with exit code {exit_code}: {output}")]
    CommandFailed {
        /// The nonzero exit status
        exit_code: i32,
        /// Combined stdout/stderr up to process exit
        output: String,
    },

    /// Caller- or deadline-initiated termination
    #[error("execution cancelled: {reason}")]
    Cancelled {
        /// What triggered the termination
        reason: String,
    },

    /// Verb dispatched against an environment of the wrong platform
    #[error("{operation} is not supported on {platform} environments")]
    UnsupportedPlatform {
        /// Protocol verb
        operation: &'static str,
        /// Platform of the targeted connection
        platform: Platform,
    },

    /// Sync transfer failed; the store may hold a partial tree and the next
    /// successful run repairs it
    #[error("transfer failed: {0}")]
    Transfer(String),
}

impl From<ChannelError> for EngineError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Cancelled => EngineError::Cancelled {
                reason: "cancelled by caller".to_string(),
            },
            ChannelError::Timeout { timeout } => EngineError::Cancelled {
                reason: format!("deadline of {timeout:?} exceeded"),
            },
            other => EngineError::Connection(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn interruptions_map_to_cancelled() {
        let cancelled: EngineError = ChannelError::Cancelled.into();
        assert!(matches!(cancelled, EngineError::Cancelled { .. }));

        let timed_out: EngineError = ChannelError::Timeout {
            timeout: Duration::from_secs(5),
        }
        .into();
        assert!(matches!(timed_out, EngineError::Cancelled { .. }));
    }

    #[test]
    fn transport_faults_map_to_connection() {
        let err: EngineError = ChannelError::ConnectionFailed("unreachable".to_string()).into();
        assert!(matches!(err, EngineError::Connection(_)));
    }
}

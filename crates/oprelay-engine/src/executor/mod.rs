//! Verb executors
//!
//! Each executor turns one request variant into a channel invocation and maps
//! the captured output onto the exit-code contract: 0 is the sole success
//! signal, everything else fails with the output attached.

pub mod env;
pub mod expect;
pub mod powershell;
pub mod shell;
pub mod sync;

use oprelay_api::{Platform, RunCommandResponse};
use oprelay_exec::ExecOutput;

use crate::error::EngineError;

/// Map a completed execution onto the response/failure contract
pub(crate) fn complete(output: ExecOutput) -> Result<RunCommandResponse, EngineError> {
    if output.success() {
        Ok(RunCommandResponse {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        })
    } else {
        Err(EngineError::CommandFailed {
            exit_code: output.exit_code,
            output: output.combined(),
        })
    }
}

/// Reject a verb/platform mismatch before any remote I/O happens
pub(crate) fn require_platform(
    operation: &'static str,
    actual: Platform,
    expected: Platform,
) -> Result<(), EngineError> {
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::UnsupportedPlatform {
            operation,
            platform: actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_exit_is_the_sole_success_signal() {
        let ok = ExecOutput {
            exit_code: 0,
            stdout: "done".to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(5),
        };
        let response = complete(ok).unwrap();
        assert_eq!(response.stdout, "done");

        let failed = ExecOutput {
            exit_code: 3,
            stdout: "partial".to_string(),
            stderr: "died".to_string(),
            duration: Duration::from_millis(5),
        };
        match complete(failed) {
            Err(EngineError::CommandFailed { exit_code, output }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(output, "partial\ndied");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}

//! Response types for the execution protocol

use serde::{Deserialize, Serialize};

/// Captured output of a completed run_bash/run_powershell/run_expect request.
///
/// Produced exactly once per successful execution; a nonzero exit never
/// reaches this type (it surfaces as a failure carrying the same output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandResponse {
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Exit status code (0 for success)
    pub exit_code: i32,
}

impl RunCommandResponse {
    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Result of one dispatched request.
///
/// Sync and log operations carry no payload on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResponse {
    Command(RunCommandResponse),
    Synced,
    Logged,
}

impl ExecutionResponse {
    /// Captured command output, if this response carries one
    #[must_use]
    pub fn command(&self) -> Option<&RunCommandResponse> {
        match self {
            ExecutionResponse::Command(out) => Some(out),
            ExecutionResponse::Synced | ExecutionResponse::Logged => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_joins_streams() {
        let response = RunCommandResponse {
            stdout: "ok".to_string(),
            stderr: "warning".to_string(),
            exit_code: 0,
        };
        assert_eq!(response.combined_output(), "ok\nwarning");

        let quiet = RunCommandResponse {
            stdout: String::new(),
            stderr: "boom".to_string(),
            exit_code: 0,
        };
        assert_eq!(quiet.combined_output(), "boom");
    }
}

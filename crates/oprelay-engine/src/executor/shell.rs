//! Shell executor (run_bash)

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use oprelay_api::{EnvVars, Platform, RunCommandResponse};
use oprelay_exec::{Channel, sh_quote};

use super::{complete, env, require_platform};
use crate::error::EngineError;

/// Run a bash command on a Unix channel.
///
/// Variables are exported into the shell's invocation environment, the shell
/// starts in the environment user's home directory, and `use_login_shell`
/// selects `bash -l`. Exit 0 yields the captured output; any other code
/// fails with the same output attached.
#[instrument(skip_all, fields(login = use_login_shell))]
pub async fn run(
    channel: &dyn Channel,
    command: &str,
    variables: &EnvVars,
    use_login_shell: bool,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<RunCommandResponse, EngineError> {
    require_platform("run_bash", channel.platform(), Platform::Unix)?;

    let script = format!("{}{}", env::unix_prefix(variables), command);
    let flags = if use_login_shell { "-lc" } else { "-c" };
    let invocation = format!("cd && exec bash {flags} {}", sh_quote(&script));

    debug!(vars = variables.len(), "running shell command");

    let output = channel.exec(&invocation, deadline, cancel).await?;
    complete(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprelay_exec::LocalChannel;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let channel = LocalChannel::default();
        let response = run(
            &channel,
            "echo hello",
            &EnvVars::new(),
            false,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(response.exit_code, 0);
        assert_eq!(response.stdout, "hello\n");
    }

    #[tokio::test]
    async fn injected_variable_reaches_the_command() {
        let channel = LocalChannel::default();
        let response = run(
            &channel,
            "echo $FOO",
            &EnvVars::from_pairs([("FOO", "bar")]),
            false,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(response.stdout, "bar\n");
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_output() {
        let channel = LocalChannel::default();
        let result = run(
            &channel,
            "echo progress; exit 3",
            &EnvVars::new(),
            false,
            None,
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(EngineError::CommandFailed { exit_code, output }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(output.trim(), "progress");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn windows_channel_is_rejected() {
        let channel = LocalChannel::new(Platform::Windows);
        let result = run(
            &channel,
            "echo hello",
            &EnvVars::new(),
            false,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EngineError::UnsupportedPlatform { operation: "run_bash", .. })
        ));
    }
}

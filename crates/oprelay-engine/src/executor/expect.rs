//! Expect executor (run_expect)

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use oprelay_api::{EnvVars, Platform, RunCommandResponse};
use oprelay_exec::{Channel, sh_quote};

use super::{complete, env, require_platform};
use crate::error::EngineError;

/// Run an expect (TCL) automation script on a Unix channel.
///
/// The script drives interactive prompt/response pairs itself; the executor
/// only hands it to the expect interpreter with the requested variables
/// exported. Exit-code semantics match the shell executor.
#[instrument(skip_all)]
pub async fn run(
    channel: &dyn Channel,
    command: &str,
    variables: &EnvVars,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<RunCommandResponse, EngineError> {
    require_platform("run_expect", channel.platform(), Platform::Unix)?;

    let invocation = format!(
        "cd && {}exec expect -c {}",
        env::unix_prefix(variables),
        sh_quote(command)
    );

    debug!(vars = variables.len(), "running expect script");

    let output = channel.exec(&invocation, deadline, cancel).await?;
    complete(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprelay_exec::LocalChannel;

    #[tokio::test]
    async fn windows_channel_is_rejected() {
        let channel = LocalChannel::new(Platform::Windows);
        let result = run(
            &channel,
            r#"expect "password:" { send "x\r" }"#,
            &EnvVars::new(),
            None,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EngineError::UnsupportedPlatform {
                operation: "run_expect",
                ..
            })
        ));
    }
}

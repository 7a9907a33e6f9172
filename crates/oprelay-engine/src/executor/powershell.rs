//! PowerShell executor (run_powershell)

use std::time::Duration;

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use oprelay_api::{EnvVars, Platform, RunCommandResponse};
use oprelay_exec::Channel;

use super::{complete, env, require_platform};
use crate::error::EngineError;

/// Run a PowerShell script on a Windows channel.
///
/// The script (with its `$env:` variable prefix) travels as an encoded
/// command, which sidesteps the remote shell's quoting rules entirely.
/// There is no login-shell concept on the target platform.
#[instrument(skip_all)]
pub async fn run(
    channel: &dyn Channel,
    command: &str,
    variables: &EnvVars,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<RunCommandResponse, EngineError> {
    require_platform("run_powershell", channel.platform(), Platform::Windows)?;

    let script = format!("{}{}", env::powershell_prefix(variables), command);
    let invocation = format!(
        "powershell -NonInteractive -EncodedCommand {}",
        encode_command(&script)
    );

    debug!(vars = variables.len(), "running powershell script");

    let output = channel.exec(&invocation, deadline, cancel).await?;
    complete(output)
}

/// Base64 of the script's UTF-16LE bytes, as -EncodedCommand expects
fn encode_command(script: &str) -> String {
    let utf16le: Vec<u8> = script
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(utf16le)
}

//! Injected execution interface
//!
//! Host runtimes hand plugin bindings a single object with one method per
//! protocol verb. [`crate::ExecutionEngine`] is the production
//! implementation; tests wire in fakes.

use async_trait::async_trait;

use oprelay_api::{
    LogRequest, RunBashRequest, RunCommandResponse, RunExpectRequest, RunPowerShellRequest,
    RunSyncRequest,
};

use crate::error::EngineError;

/// One method per verb of the closed protocol
#[async_trait]
pub trait RemoteExecutionBackend: Send + Sync {
    /// Execute a shell command on a Unix environment
    async fn run_bash(&self, request: RunBashRequest) -> Result<RunCommandResponse, EngineError>;

    /// Execute a PowerShell script on a Windows environment
    async fn run_powershell(
        &self,
        request: RunPowerShellRequest,
    ) -> Result<RunCommandResponse, EngineError>;

    /// Execute an expect (TCL) script on a Unix environment
    async fn run_expect(&self, request: RunExpectRequest)
    -> Result<RunCommandResponse, EngineError>;

    /// Pull a directory tree into the local content store
    async fn run_sync(&self, request: RunSyncRequest) -> Result<(), EngineError>;

    /// Record a log message; never fails
    fn log(&self, request: LogRequest);
}

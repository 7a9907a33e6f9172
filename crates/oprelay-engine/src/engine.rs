//! Execution engine: request dispatch

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use oprelay_api::{
    ExecutionRequest, ExecutionResponse, LogLevel, LogRequest, Platform, RunBashRequest,
    RunCommandResponse, RunExpectRequest, RunPowerShellRequest, RunSyncRequest,
};
use oprelay_exec::{Channel, ConnectionResolver};

use crate::backend::RemoteExecutionBackend;
use crate::error::EngineError;
use crate::executor;
use crate::logsink::LogSink;

/// Engine-wide settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on one command's runtime; `None` waits indefinitely
    pub command_timeout: Option<Duration>,
    /// Root of the local content store sync transfers land in
    pub store_root: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            command_timeout: Some(Duration::from_secs(3600)),
            store_root: PathBuf::from("oprelay-store"),
        }
    }
}

/// Dispatches execution requests to the matching verb executor.
///
/// Every request resolves its own channel; channels are never shared between
/// concurrent executions and are released on every exit path. Failures are
/// surfaced to the caller, never retried.
pub struct ExecutionEngine {
    resolver: ConnectionResolver,
    sink: Arc<dyn LogSink>,
    options: EngineOptions,
}

impl ExecutionEngine {
    pub fn new(resolver: ConnectionResolver, sink: Arc<dyn LogSink>, options: EngineOptions) -> Self {
        Self {
            resolver,
            sink,
            options,
        }
    }

    /// Execute one request to completion
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResponse, EngineError> {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Execute one request, terminating the remote process if `cancel` fires
    #[instrument(skip_all, fields(kind = request.kind()))]
    pub async fn execute_with_cancel(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResponse, EngineError> {
        match request {
            ExecutionRequest::RunBash(req) => {
                let target = req.remote_connection.environment.clone();
                self.traced("run_bash", &target, self.bash(&req, &cancel))
                    .await
                    .map(ExecutionResponse::Command)
            }
            ExecutionRequest::RunPowerShell(req) => {
                let target = req.remote_connection.environment.clone();
                self.traced("run_powershell", &target, self.powershell(&req, &cancel))
                    .await
                    .map(ExecutionResponse::Command)
            }
            ExecutionRequest::RunExpect(req) => {
                let target = req.remote_connection.environment.clone();
                self.traced("run_expect", &target, self.expect(&req, &cancel))
                    .await
                    .map(ExecutionResponse::Command)
            }
            ExecutionRequest::RunSync(req) => {
                let target = req.remote_connection.environment.clone();
                self.traced("run_sync", &target, self.sync(&req))
                    .await
                    .map(|()| ExecutionResponse::Synced)
            }
            // log bypasses connection resolution entirely
            ExecutionRequest::Log(req) => {
                self.sink.record(req.level, &req.message);
                Ok(ExecutionResponse::Logged)
            }
        }
    }

    /// Record start/end trace events around one dispatched operation
    async fn traced<T, F>(
        &self,
        kind: &'static str,
        target: &str,
        operation: F,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let started = Instant::now();
        self.sink
            .record(LogLevel::Debug, &format!("{kind} start target={target}"));

        let result = operation.await;

        let elapsed = started.elapsed();
        let outcome = match &result {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("error: {e}"),
        };
        self.sink.record(
            LogLevel::Debug,
            &format!("{kind} end target={target} elapsed={elapsed:?} status={outcome}"),
        );

        result
    }

    async fn bash(
        &self,
        req: &RunBashRequest,
        cancel: &CancellationToken,
    ) -> Result<RunCommandResponse, EngineError> {
        executor::require_platform("run_bash", req.remote_connection.platform, Platform::Unix)?;

        let channel = self.resolver.resolve(&req.remote_connection, None).await?;
        let result = executor::shell::run(
            channel.as_ref(),
            &req.command,
            &req.variables,
            req.use_login_shell,
            self.options.command_timeout,
            cancel,
        )
        .await;
        self.release(channel).await;
        result
    }

    async fn powershell(
        &self,
        req: &RunPowerShellRequest,
        cancel: &CancellationToken,
    ) -> Result<RunCommandResponse, EngineError> {
        // checked against the descriptor so a mismatch never opens a
        // connection
        executor::require_platform(
            "run_powershell",
            req.remote_connection.platform,
            Platform::Windows,
        )?;

        let channel = self.resolver.resolve(&req.remote_connection, None).await?;
        let result = executor::powershell::run(
            channel.as_ref(),
            &req.command,
            &req.variables,
            self.options.command_timeout,
            cancel,
        )
        .await;
        self.release(channel).await;
        result
    }

    async fn expect(
        &self,
        req: &RunExpectRequest,
        cancel: &CancellationToken,
    ) -> Result<RunCommandResponse, EngineError> {
        executor::require_platform("run_expect", req.remote_connection.platform, Platform::Unix)?;

        let channel = self.resolver.resolve(&req.remote_connection, None).await?;
        let result = executor::expect::run(
            channel.as_ref(),
            &req.command,
            &req.variables,
            self.options.command_timeout,
            cancel,
        )
        .await;
        self.release(channel).await;
        result
    }

    async fn sync(&self, req: &RunSyncRequest) -> Result<(), EngineError> {
        executor::require_platform("run_sync", req.remote_connection.platform, Platform::Unix)?;

        let channel = self
            .resolver
            .resolve(&req.remote_connection, req.rsync_user.as_deref())
            .await?;
        let result = executor::sync::run(channel.as_ref(), req, &self.options.store_root).await;
        self.release(channel).await;
        result
    }

    async fn release(&self, channel: Box<dyn Channel>) {
        if let Err(e) = channel.close().await {
            warn!(error = %e, "failed to close channel");
        }
    }
}

#[async_trait]
impl RemoteExecutionBackend for ExecutionEngine {
    async fn run_bash(&self, request: RunBashRequest) -> Result<RunCommandResponse, EngineError> {
        let target = request.remote_connection.environment.clone();
        self.traced(
            "run_bash",
            &target,
            self.bash(&request, &CancellationToken::new()),
        )
        .await
    }

    async fn run_powershell(
        &self,
        request: RunPowerShellRequest,
    ) -> Result<RunCommandResponse, EngineError> {
        let target = request.remote_connection.environment.clone();
        self.traced(
            "run_powershell",
            &target,
            self.powershell(&request, &CancellationToken::new()),
        )
        .await
    }

    async fn run_expect(
        &self,
        request: RunExpectRequest,
    ) -> Result<RunCommandResponse, EngineError> {
        let target = request.remote_connection.environment.clone();
        self.traced(
            "run_expect",
            &target,
            self.expect(&request, &CancellationToken::new()),
        )
        .await
    }

    async fn run_sync(&self, request: RunSyncRequest) -> Result<(), EngineError> {
        let target = request.remote_connection.environment.clone();
        self.traced("run_sync", &target, self.sync(&request)).await
    }

    fn log(&self, request: LogRequest) {
        self.sink.record(request.level, &request.message);
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use oprelay_api::{
    EnvVars, ExecutionRequest, ExecutionResponse, LogLevel, LogRequest, Platform,
    RemoteConnection, RunBashRequest, RunPowerShellRequest, RunSyncRequest,
};
use oprelay_engine::executor;
use oprelay_engine::{
    EngineError, EngineOptions, ExecutionEngine, MemoryLogSink, RemoteExecutionBackend,
};
use oprelay_exec::{Channel, ChannelError, ConnectionResolver, EntryKind, ExecOutput, RemoteEntry};

/// Channel that counts every operation, for verifying that a rejected verb
/// never touches the transport
struct CountingChannel {
    platform: Platform,
    operations: AtomicUsize,
}

impl CountingChannel {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            operations: AtomicUsize::new(0),
        }
    }

    fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for CountingChannel {
    async fn exec(
        &self,
        _command: &str,
        _deadline: Option<Duration>,
        _cancel: &CancellationToken,
    ) -> Result<ExecOutput, ChannelError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(ExecOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }

    async fn list_tree(&self, _path: &str) -> Result<Vec<RemoteEntry>, ChannelError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(vec![RemoteEntry::new("a.txt", EntryKind::File)])
    }

    async fn read_file(&self, _path: &str) -> Result<Vec<u8>, ChannelError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn read_link(&self, _path: &str) -> Result<String, ChannelError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn transport(&self) -> &'static str {
        "counting"
    }

    async fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn local_connection() -> RemoteConnection {
    RemoteConnection::unix("local", "localhost", "root")
}

fn engine_with_sink(store_root: PathBuf) -> (ExecutionEngine, Arc<MemoryLogSink>) {
    let sink = Arc::new(MemoryLogSink::new());
    let engine = ExecutionEngine::new(
        ConnectionResolver::new(),
        sink.clone(),
        EngineOptions {
            command_timeout: Some(Duration::from_secs(30)),
            store_root,
        },
    );
    (engine, sink)
}

fn engine() -> ExecutionEngine {
    engine_with_sink(PathBuf::from("unused-store")).0
}

fn bash_request(command: &str, variables: EnvVars) -> ExecutionRequest {
    ExecutionRequest::RunBash(RunBashRequest {
        remote_connection: local_connection(),
        command: command.to_string(),
        variables,
        use_login_shell: false,
    })
}

#[tokio::test]
async fn bash_exit_zero_yields_response() {
    let response = engine()
        .execute(bash_request("exit 0", EnvVars::new()))
        .await
        .unwrap();

    let command = response.command().expect("command response");
    assert_eq!(command.exit_code, 0);
    assert_eq!(command.stdout, "");
}

#[tokio::test]
async fn bash_nonzero_exit_is_failure_with_output() {
    let result = engine()
        .execute(bash_request("echo before the end; exit 3", EnvVars::new()))
        .await;

    match result {
        Err(EngineError::CommandFailed { exit_code, output }) => {
            assert_eq!(exit_code, 3);
            assert_eq!(output.trim(), "before the end");
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn bash_variables_reach_the_command_environment() {
    let response = engine()
        .execute(bash_request(
            "echo $FOO",
            EnvVars::from_pairs([("FOO", "bar")]),
        ))
        .await
        .unwrap();

    assert_eq!(response.command().unwrap().stdout, "bar\n");
}

#[tokio::test]
async fn powershell_on_unix_descriptor_fails_before_resolution() {
    // unroutable host: any resolution attempt would surface as a
    // connection error, not UnsupportedPlatform
    let request = ExecutionRequest::RunPowerShell(RunPowerShellRequest {
        remote_connection: RemoteConnection::unix("db1", "203.0.113.9", "svc"),
        command: "Get-ChildItem".to_string(),
        variables: EnvVars::new(),
    });

    let result = engine().execute(request).await;
    assert!(matches!(
        result,
        Err(EngineError::UnsupportedPlatform {
            operation: "run_powershell",
            platform: Platform::Unix,
        })
    ));
}

#[tokio::test]
async fn powershell_executor_touches_no_channel_on_mismatch() {
    let channel = CountingChannel::new(Platform::Unix);
    let result = executor::powershell::run(
        &channel,
        "Get-ChildItem",
        &EnvVars::new(),
        None,
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(EngineError::UnsupportedPlatform { .. })
    ));
    assert_eq!(channel.operation_count(), 0);
}

#[tokio::test]
async fn cancelling_an_inflight_run_terminates_it_quickly() {
    let engine = engine();
    let cancel = CancellationToken::new();

    let killer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        killer.cancel();
    });

    let started = Instant::now();
    let result = engine
        .execute_with_cancel(bash_request("sleep 30", EnvVars::new()), cancel)
        .await;

    assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn deadline_expiry_surfaces_as_cancelled() {
    let sink = Arc::new(MemoryLogSink::new());
    let engine = ExecutionEngine::new(
        ConnectionResolver::new(),
        sink,
        EngineOptions {
            command_timeout: Some(Duration::from_millis(100)),
            store_root: PathBuf::from("unused-store"),
        },
    );

    let result = engine
        .execute(bash_request("sleep 30", EnvVars::new()))
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled { .. })));
}

#[tokio::test]
async fn sync_lands_in_the_store_keyed_by_environment() {
    let source = tempfile::tempdir().unwrap();
    std::fs::write(source.path().join("settings.conf"), b"x=1").unwrap();

    let store = tempfile::tempdir().unwrap();
    let (engine, _sink) = engine_with_sink(store.path().to_path_buf());

    let request = ExecutionRequest::RunSync(RunSyncRequest {
        remote_connection: local_connection(),
        source_directory: source.path().to_string_lossy().to_string(),
        rsync_user: None,
        exclude_paths: vec![],
        sym_links_to_follow: vec![],
    });

    let response = engine.execute(request).await.unwrap();
    assert!(matches!(response, ExecutionResponse::Synced));
    assert_eq!(
        std::fs::read(store.path().join("local/settings.conf")).unwrap(),
        b"x=1"
    );
}

#[tokio::test]
async fn log_requests_reach_the_sink_in_call_order() {
    let (engine, sink) = engine_with_sink(PathBuf::from("unused-store"));

    for (level, message) in [
        (LogLevel::Debug, "probing"),
        (LogLevel::Info, "refresh started"),
        (LogLevel::Error, "refresh failed"),
    ] {
        let response = engine
            .execute(ExecutionRequest::Log(LogRequest {
                level,
                message: message.to_string(),
            }))
            .await
            .unwrap();
        assert!(matches!(response, ExecutionResponse::Logged));
    }

    let messages: Vec<_> = sink.records().into_iter().map(|r| r.message).collect();
    assert_eq!(
        messages,
        vec!["probing", "refresh started", "refresh failed"]
    );
}

#[tokio::test]
async fn dispatched_requests_leave_trace_events() {
    let (engine, sink) = engine_with_sink(PathBuf::from("unused-store"));

    engine
        .execute(bash_request("exit 0", EnvVars::new()))
        .await
        .unwrap();

    let messages = sink.messages_at_least(LogLevel::Debug);
    assert!(messages.iter().any(|m| m == "run_bash start target=local"));
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("run_bash end target=local"))
    );
}

#[tokio::test]
async fn engine_serves_as_injected_backend() {
    let backend: Arc<dyn RemoteExecutionBackend> = Arc::new(engine());

    let response = backend
        .run_bash(RunBashRequest {
            remote_connection: local_connection(),
            command: "echo wired".to_string(),
            variables: EnvVars::new(),
            use_login_shell: false,
        })
        .await
        .unwrap();

    assert_eq!(response.stdout, "wired\n");

    backend.log(LogRequest {
        level: LogLevel::Info,
        message: "backend log".to_string(),
    });
}

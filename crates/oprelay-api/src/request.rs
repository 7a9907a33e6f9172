//! Request types for the execution protocol

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::connection::RemoteConnection;

/// Severity of a log record, ordered `Debug < Info < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Environment variables injected into a command's invocation environment.
///
/// Keys are unique; inserting an existing key replaces its value
/// (last-write-wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvVars(BTreeMap<String, String>);

impl EnvVars {
    /// Empty variable set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs; later pairs win on duplicate names
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars = Self::new();
        for (name, value) in pairs {
            vars.insert(name, value);
        }
        vars
    }

    /// Set a variable, replacing any previous value for the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Run a shell command on a Unix environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBashRequest {
    pub remote_connection: RemoteConnection,
    /// Command or script body
    pub command: String,
    /// Variables set in the command's invocation environment
    #[serde(default)]
    pub variables: EnvVars,
    /// Start the shell as a login shell
    #[serde(default)]
    pub use_login_shell: bool,
}

/// Run a PowerShell script on a Windows environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPowerShellRequest {
    pub remote_connection: RemoteConnection,
    pub command: String,
    #[serde(default)]
    pub variables: EnvVars,
}

/// Run an expect (TCL) automation script on a Unix environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExpectRequest {
    pub remote_connection: RemoteConnection,
    pub command: String,
    #[serde(default)]
    pub variables: EnvVars,
}

/// Pull a directory tree from an environment into the local content store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSyncRequest {
    pub remote_connection: RemoteConnection,
    /// Remote directory whose contents are transferred
    pub source_directory: String,
    /// Overrides the connection user for this transfer's authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsync_user: Option<String>,
    /// Glob patterns excluded from the transfer, matched against paths
    /// relative to `source_directory`
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// Symbolic links (relative paths) dereferenced and copied as files
    #[serde(default)]
    pub sym_links_to_follow: Vec<String>,
}

/// Record a message against the current operation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRequest {
    pub level: LogLevel,
    pub message: String,
}

/// The closed set of operations the engine executes.
///
/// Adding a verb is a wire-schema change, so dispatch matches exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionRequest {
    RunBash(RunBashRequest),
    RunPowerShell(RunPowerShellRequest),
    RunExpect(RunExpectRequest),
    RunSync(RunSyncRequest),
    Log(LogRequest),
}

impl ExecutionRequest {
    /// Verb name as it appears on the wire
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionRequest::RunBash(_) => "run_bash",
            ExecutionRequest::RunPowerShell(_) => "run_power_shell",
            ExecutionRequest::RunExpect(_) => "run_expect",
            ExecutionRequest::RunSync(_) => "run_sync",
            ExecutionRequest::Log(_) => "log",
        }
    }

    /// Connection the request targets; `None` for log records
    #[must_use]
    pub fn connection(&self) -> Option<&RemoteConnection> {
        match self {
            ExecutionRequest::RunBash(req) => Some(&req.remote_connection),
            ExecutionRequest::RunPowerShell(req) => Some(&req.remote_connection),
            ExecutionRequest::RunExpect(req) => Some(&req.remote_connection),
            ExecutionRequest::RunSync(req) => Some(&req.remote_connection),
            ExecutionRequest::Log(_) => None,
        }
    }
}

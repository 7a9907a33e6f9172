//! Channel trait: the scoped transport one request executes against

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use oprelay_api::Platform;

use crate::error::ChannelError;
use crate::output::ExecOutput;

/// Kind of a remote tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
}

/// One entry of a remote directory tree, path relative to the listed root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub rel_path: String,
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn new(rel_path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            rel_path: rel_path.into(),
            kind,
        }
    }
}

/// An open, authenticated path to one environment.
///
/// A channel is exclusively owned by the executor serving one request and
/// must be closed on every exit path. Commands stream their output
/// incrementally so large captures cannot deadlock against a full pipe
/// buffer; cancellation and deadlines terminate the running process.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Run a command to completion, capturing stdout, stderr and exit code.
    ///
    /// Returns `ChannelError::Cancelled` when `cancel` fires and
    /// `ChannelError::Timeout` when `deadline` elapses; in both cases the
    /// remote process has been terminated before the error is returned.
    async fn exec(
        &self,
        command: &str,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, ChannelError>;

    /// List the tree under `path`, depth-first, paths relative to `path`
    async fn list_tree(&self, path: &str) -> Result<Vec<RemoteEntry>, ChannelError>;

    /// Read a file's bytes; symlinks are dereferenced
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ChannelError>;

    /// Read a symlink's target
    async fn read_link(&self, path: &str) -> Result<String, ChannelError>;

    /// Platform of the environment this channel is connected to
    fn platform(&self) -> Platform;

    /// Transport identifier for logging ("ssh", "local", ...)
    fn transport(&self) -> &'static str;

    /// Release the channel. Idempotent; called on every exit path.
    async fn close(&self) -> Result<(), ChannelError>;
}

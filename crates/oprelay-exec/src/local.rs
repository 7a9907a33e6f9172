//! Local channel using `tokio::process`
//!
//! Used for localhost environments and as the transport test double.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use oprelay_api::Platform;

use crate::error::ChannelError;
use crate::output::ExecOutput;
use crate::traits::{Channel, EntryKind, RemoteEntry};

/// Channel executing on the local machine
#[derive(Debug, Clone)]
pub struct LocalChannel {
    platform: Platform,
}

impl LocalChannel {
    /// Create a local channel presenting as the given platform
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(Platform::Unix)
    }
}

async fn read_all(
    mut pipe: impl AsyncRead + Unpin + Send + 'static,
) -> Result<Vec<u8>, std::io::Error> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[async_trait]
impl Channel for LocalChannel {
    #[instrument(skip(self, command, cancel), level = "debug")]
    async fn exec(
        &self,
        command: &str,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, ChannelError> {
        let start = Instant::now();

        debug!(command = %command, "executing local command");

        // Use a shell to support pipes, redirections, etc.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| ChannelError::SpawnFailed(e.to_string()))?;

        // Drain both pipes off-task so a full pipe buffer can never block
        // the child
        let stdout_pipe = child.stdout.take().ok_or(ChannelError::SpawnFailed(
            "stdout pipe unavailable".to_string(),
        ))?;
        let stderr_pipe = child.stderr.take().ok_or(ChannelError::SpawnFailed(
            "stderr pipe unavailable".to_string(),
        ))?;
        let stdout_task = tokio::spawn(read_all(stdout_pipe));
        let stderr_task = tokio::spawn(read_all(stderr_pipe));

        let expire = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expire);

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| ChannelError::Io(e.to_string()))?,
            () = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(ChannelError::Cancelled);
            }
            () = &mut expire => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                error!(
                    timeout = ?deadline,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                return Err(ChannelError::Timeout {
                    timeout: deadline.unwrap_or_default(),
                });
            }
        };

        let stdout = stdout_task
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))?
            .map_err(|e| ChannelError::Io(e.to_string()))?;
        let stderr = stderr_task
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))?
            .map_err(|e| ChannelError::Io(e.to_string()))?;

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            status = exit_code,
            duration = ?duration,
            "command completed"
        );

        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration,
        })
    }

    async fn list_tree(&self, path: &str) -> Result<Vec<RemoteEntry>, ChannelError> {
        let root = PathBuf::from(path);
        let mut entries = Vec::new();

        for entry in walkdir::WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ChannelError::Io(e.to_string()))?;
            let rel = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| ChannelError::Io(e.to_string()))?;

            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };

            entries.push(RemoteEntry::new(rel.to_string_lossy(), kind));
        }

        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ChannelError> {
        tokio::fs::read(Path::new(path))
            .await
            .map_err(|e| ChannelError::Io(format!("reading {path}: {e}")))
    }

    async fn read_link(&self, path: &str) -> Result<String, ChannelError> {
        let target = tokio::fs::read_link(Path::new(path))
            .await
            .map_err(|e| ChannelError::Io(format!("readlink {path}: {e}")))?;
        Ok(target.to_string_lossy().to_string())
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn transport(&self) -> &'static str {
        "local"
    }

    async fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

//! SSH channel transport using the russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use oprelay_api::{Platform, RemoteConnection};

use crate::error::ChannelError;
use crate::keys::resolve_key;
use crate::output::ExecOutput;
use crate::quote::sh_quote;
use crate::traits::{Channel, EntryKind, RemoteEntry};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        // In production, this should verify against known_hosts
        Ok(true)
    }
}

/// SSH-backed channel to one environment.
///
/// Opened and authenticated by the resolver; exclusively owned by the
/// executor serving one request. Each `exec` runs on its own session
/// channel of the shared SSH connection.
pub struct SshChannel {
    host: String,
    user: String,
    platform: Platform,
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannel")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl SshChannel {
    /// Connect and authenticate against the environment in `conn`.
    ///
    /// `user_override` replaces the descriptor's user for this channel's
    /// authentication only (sync transfers with a dedicated transfer user).
    ///
    /// # Errors
    /// `ConnectionFailed` if the host is unreachable, `KeyError` /
    /// `AuthenticationFailed` if key material cannot be resolved or is
    /// rejected.
    #[instrument(skip(conn), fields(host = %conn.host, environment = %conn.environment))]
    pub async fn connect(
        conn: &RemoteConnection,
        user_override: Option<&str>,
    ) -> Result<Self, ChannelError> {
        let user = user_override.unwrap_or(&conn.user).to_string();
        let key = resolve_key(&conn.key).map_err(|e| ChannelError::KeyError(e.to_string()))?;

        info!(
            host = %conn.host,
            port = conn.port,
            user = %user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());
        let handler = SshClientHandler;

        let mut session = client::connect(config, (&conn.host[..], conn.port), handler)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        if key.use_agent() {
            // TODO: agent auth needs russh's agent client wired through here
            return Err(ChannelError::AuthenticationFailed(
                "SSH agent authentication not yet implemented".to_string(),
            ));
        } else if let Some(key_path) = key.path() {
            let key_pair = load_secret_key(key_path, None)
                .map_err(|e| ChannelError::KeyError(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            let auth_res = session
                .authenticate_publickey(&user, PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg))
                .await
                .map_err(|e| ChannelError::AuthenticationFailed(e.to_string()))?;

            if !auth_res.success() {
                return Err(ChannelError::AuthenticationFailed(
                    "public key authentication failed".to_string(),
                ));
            }
        } else {
            return Err(ChannelError::AuthenticationFailed(
                "no authentication method available".to_string(),
            ));
        }

        info!(host = %conn.host, user = %user, "SSH connected and authenticated");

        Ok(Self {
            host: conn.host.clone(),
            user,
            platform: conn.platform,
            session: Mutex::new(Some(session)),
        })
    }

    /// Run an internal helper command (tree listing, file reads) without a
    /// deadline or caller cancellation.
    async fn exec_internal(&self, command: &str) -> Result<ExecOutput, ChannelError> {
        self.exec(command, None, &CancellationToken::new()).await
    }

    async fn find_entries(
        &self,
        path: &str,
        type_flag: char,
        kind: EntryKind,
    ) -> Result<Vec<RemoteEntry>, ChannelError> {
        let command = format!(
            "find {} -mindepth 1 -type {} | LC_ALL=C sort",
            sh_quote(path),
            type_flag
        );
        let output = self.exec_internal(&command).await?;
        if !output.success() {
            return Err(ChannelError::Io(format!(
                "listing {path} failed (exit {}): {}",
                output.exit_code, output.stderr
            )));
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(|rel| RemoteEntry::new(rel, kind))
            .collect())
    }
}

#[async_trait]
impl Channel for SshChannel {
    #[instrument(skip(self, command, cancel), fields(host = %self.host))]
    async fn exec(
        &self,
        command: &str,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, ChannelError> {
        let mut session_lock = self.session.lock().await;
        let session = session_lock.as_mut().ok_or(ChannelError::NotConnected)?;

        debug!(command = %command, "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))?;

        let expire = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expire);

        let mut status: Option<i32> = None;
        let mut eof = false;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            tokio::select! {
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.extend_from_slice(&data);
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        if ext == 1 {
                            // stderr
                            stderr.extend_from_slice(&data);
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        status = Some(exit_status.cast_signed());
                        if eof {
                            break;
                        }
                    }
                    Some(ChannelMsg::Eof) => {
                        eof = true;
                        if status.is_some() {
                            break;
                        }
                    }
                    Some(ChannelMsg::Close) | None => break,
                    _ => {}
                },
                () = cancel.cancelled() => {
                    terminate(&mut channel).await;
                    return Err(ChannelError::Cancelled);
                }
                () = &mut expire => {
                    terminate(&mut channel).await;
                    return Err(ChannelError::Timeout {
                        timeout: deadline.unwrap_or_default(),
                    });
                }
            }
        }

        let duration = start.elapsed();
        let exit_code = status.unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            status = exit_code,
            duration = ?duration,
            "remote command completed"
        );

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
            duration,
        })
    }

    async fn list_tree(&self, path: &str) -> Result<Vec<RemoteEntry>, ChannelError> {
        let mut entries = self.find_entries(path, 'd', EntryKind::Dir).await?;
        entries.extend(self.find_entries(path, 'f', EntryKind::File).await?);
        entries.extend(self.find_entries(path, 'l', EntryKind::Symlink).await?);
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ChannelError> {
        // shell redirection dereferences symlinks, which is what followed
        // links rely on
        let command = format!("base64 < {}", sh_quote(path));
        let output = self.exec_internal(&command).await?;
        if !output.success() {
            return Err(ChannelError::Io(format!(
                "reading {path} failed (exit {}): {}",
                output.exit_code, output.stderr
            )));
        }

        use base64::Engine;
        let packed: String = output.stdout.split_whitespace().collect();
        base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| ChannelError::Io(format!("decoding {path}: {e}")))
    }

    async fn read_link(&self, path: &str) -> Result<String, ChannelError> {
        let command = format!("readlink {}", sh_quote(path));
        let output = self.exec_internal(&command).await?;
        if !output.success() {
            return Err(ChannelError::Io(format!(
                "readlink {path} failed (exit {}): {}",
                output.exit_code, output.stderr
            )));
        }
        Ok(output.stdout.trim_end().to_string())
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn transport(&self) -> &'static str {
        "ssh"
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ChannelError::Io(e.to_string()))?;
            info!(host = %self.host, "SSH disconnected");
        }
        Ok(())
    }
}

/// Kill the remote process and drop the session channel, best-effort
async fn terminate(channel: &mut russh::Channel<client::Msg>) {
    let _ = channel.signal(russh::Sig::KILL).await;
    let _ = channel.close().await;
}

//! Connection resolution
//!
//! Turns a connection descriptor into a live, authenticated channel. Every
//! request gets its own channel; channels are never shared between
//! concurrent requests, so the resolver holds no live-connection cache.

use tracing::instrument;

use oprelay_api::RemoteConnection;

use crate::error::ChannelError;
use crate::local::LocalChannel;
use crate::ssh::SshChannel;
use crate::traits::Channel;

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Resolves descriptors into channels
#[derive(Debug, Clone, Default)]
pub struct ConnectionResolver;

impl ConnectionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Open a channel for one request.
    ///
    /// `user_override` substitutes the authenticating user without touching
    /// the descriptor. The returned channel is exclusively owned by the
    /// caller and must be closed on every exit path.
    ///
    /// # Errors
    /// `MalformedDescriptor` if required fields are empty,
    /// `ConnectionFailed` / `AuthenticationFailed` / `KeyError` from the
    /// transport.
    #[instrument(skip(self, conn), fields(environment = %conn.environment, host = %conn.host))]
    pub async fn resolve(
        &self,
        conn: &RemoteConnection,
        user_override: Option<&str>,
    ) -> Result<Box<dyn Channel>, ChannelError> {
        validate(conn)?;

        if LOCAL_HOSTS.contains(&conn.host.as_str()) {
            return Ok(Box::new(LocalChannel::new(conn.platform)));
        }

        let channel = SshChannel::connect(conn, user_override).await?;
        Ok(Box::new(channel))
    }
}

fn validate(conn: &RemoteConnection) -> Result<(), ChannelError> {
    if conn.environment.trim().is_empty() {
        return Err(ChannelError::MalformedDescriptor(
            "environment name is empty".to_string(),
        ));
    }
    if conn.host.trim().is_empty() {
        return Err(ChannelError::MalformedDescriptor(
            "host is empty".to_string(),
        ));
    }
    if conn.user.trim().is_empty() {
        return Err(ChannelError::MalformedDescriptor(
            "user is empty".to_string(),
        ));
    }
    if conn.port == 0 {
        return Err(ChannelError::MalformedDescriptor(
            "port must be nonzero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprelay_api::Platform;

    #[tokio::test]
    async fn localhost_resolves_to_local_channel() {
        let resolver = ConnectionResolver::new();
        let conn = RemoteConnection::unix("local", "127.0.0.1", "root");

        let channel = resolver.resolve(&conn, None).await.unwrap();
        assert_eq!(channel.transport(), "local");
        assert_eq!(channel.platform(), Platform::Unix);
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_host_is_malformed() {
        let resolver = ConnectionResolver::new();
        let conn = RemoteConnection::unix("broken", "", "root");

        let result = resolver.resolve(&conn, None).await;
        assert!(matches!(
            result,
            Err(ChannelError::MalformedDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn empty_user_is_malformed() {
        let resolver = ConnectionResolver::new();
        let conn = RemoteConnection::unix("broken", "10.0.0.9", " ");

        let result = resolver.resolve(&conn, None).await;
        assert!(matches!(
            result,
            Err(ChannelError::MalformedDescriptor(_))
        ));
    }
}

//! Remote environment descriptors

use serde::{Deserialize, Serialize};

/// Operating-system family of a target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Unix,
    Windows,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Unix => write!(f, "unix"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

/// How the private key for a connection is obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMaterial {
    /// Explicit path to a key file
    Path(String),
    /// Use the SSH agent
    Agent,
    /// Base64-encoded key in the named environment variable
    Env(String),
}

impl Default for KeyMaterial {
    fn default() -> Self {
        KeyMaterial::Agent
    }
}

/// Connection descriptor for one target environment.
///
/// Identifies where an operation runs and as which user. Immutable once
/// constructed; executors borrow it for the duration of a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConnection {
    /// Environment name, used for store layout and audit records
    pub environment: String,
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Environment user the operation executes as
    pub user: String,
    /// Target platform
    pub platform: Platform,
    /// Key material for authentication
    #[serde(default)]
    pub key: KeyMaterial,
}

fn default_port() -> u16 {
    22
}

impl RemoteConnection {
    /// Create a Unix connection with default port and agent auth
    pub fn unix(
        environment: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            host: host.into(),
            port: 22,
            user: user.into(),
            platform: Platform::Unix,
            key: KeyMaterial::Agent,
        }
    }

    /// Create a Windows connection with default port and agent auth
    pub fn windows(
        environment: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            platform: Platform::Windows,
            ..Self::unix(environment, host, user)
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set key material
    #[must_use]
    pub fn with_key(mut self, key: KeyMaterial) -> Self {
        self.key = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_when_absent() {
        let conn: RemoteConnection = serde_json::from_str(
            r#"{"environment":"db1","host":"10.0.0.4","user":"deploy","platform":"unix"}"#,
        )
        .unwrap();
        assert_eq!(conn.port, 22);
        assert_eq!(conn.key, KeyMaterial::Agent);
    }
}

//! Configuration loading and types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use oprelay_api::{KeyMaterial, Platform, RemoteConnection};
use oprelay_engine::EngineOptions;

/// Top-level configuration for the oprelay CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Known target environments
    #[serde(default)]
    pub environment: Vec<EnvironmentConfig>,
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory sync transfers land in
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,
    /// Per-command timeout in seconds; 0 disables the deadline
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            command_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("oprelay-store")
}

fn default_timeout_secs() -> u64 {
    3600
}

impl EngineConfig {
    /// Convert to engine options
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        let command_timeout = (self.command_timeout_secs > 0)
            .then(|| Duration::from_secs(self.command_timeout_secs));
        EngineOptions {
            command_timeout,
            store_root: self.store_root.clone(),
        }
    }
}

/// One named target environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Unique environment name
    pub name: String,
    /// IP address or hostname
    pub addr: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// User remote operations execute as
    #[serde(default = "default_user")]
    pub user: String,
    /// Target platform
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Path to SSH private key (falls back to ssh-agent)
    pub ssh_key: Option<String>,
    /// Environment variable holding a base64-encoded key
    pub ssh_key_env: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

fn default_platform() -> Platform {
    Platform::Unix
}

impl EnvironmentConfig {
    /// Build the connection descriptor for this environment
    #[must_use]
    pub fn connection(&self) -> RemoteConnection {
        let key = if let Some(path) = &self.ssh_key {
            KeyMaterial::Path(path.clone())
        } else if let Some(var) = &self.ssh_key_env {
            KeyMaterial::Env(var.clone())
        } else {
            KeyMaterial::Agent
        };

        RemoteConnection {
            environment: self.name.clone(),
            host: self.addr.clone(),
            port: self.port,
            user: self.user.clone(),
            platform: self.platform,
            key,
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &PathBuf) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("OPRELAY_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let paths = [
            PathBuf::from("oprelay.toml"),
            PathBuf::from("/etc/oprelay/oprelay.toml"),
            dirs::config_dir()
                .map(|p| p.join("oprelay/oprelay.toml"))
                .unwrap_or_default(),
        ];

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Look up an environment by name
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environment.iter().find(|env| env.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environments_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            store_root = "/var/lib/oprelay/store"

            [[environment]]
            name = "db1"
            addr = "10.0.0.4"
            ssh_key = "/etc/oprelay/keys/db1"

            [[environment]]
            name = "win-app"
            addr = "10.0.0.7"
            user = "svc_app"
            platform = "windows"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.command_timeout_secs, 3600);

        let db1 = config.environment("db1").unwrap();
        assert_eq!(db1.port, 22);
        assert_eq!(db1.user, "root");
        let conn = db1.connection();
        assert_eq!(conn.key, KeyMaterial::Path("/etc/oprelay/keys/db1".to_string()));

        let win = config.environment("win-app").unwrap();
        assert_eq!(win.platform, Platform::Windows);
        assert_eq!(win.connection().key, KeyMaterial::Agent);
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let engine = EngineConfig {
            store_root: PathBuf::from("store"),
            command_timeout_secs: 0,
        };
        assert!(engine.options().command_timeout.is_none());
    }
}

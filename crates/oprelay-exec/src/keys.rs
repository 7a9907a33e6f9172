//! SSH key resolution

use std::env;
use std::path::PathBuf;

use tracing::{debug, warn};

use oprelay_api::KeyMaterial;

/// Resolve key material to something the SSH transport can use.
///
/// For `Env`, decodes base64 and writes the key to a temp file that is
/// removed when the resolved key is dropped.
///
/// # Errors
/// Returns `KeyError` if resolution fails (env not set, invalid base64,
/// unreadable or world-readable key file).
pub fn resolve_key(material: &KeyMaterial) -> Result<ResolvedKey, KeyError> {
    match material {
        KeyMaterial::Path(path) => {
            let path = PathBuf::from(path);
            validate_key_permissions(&path)?;
            Ok(ResolvedKey::Path(path))
        }
        KeyMaterial::Agent => Ok(ResolvedKey::Agent),
        KeyMaterial::Env(var_name) => {
            let base64_key =
                env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
            let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;

            let temp_path = write_temp_key(&key_data)?;
            Ok(ResolvedKey::Temp(temp_path))
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Use SSH agent
    Agent,
    /// Temporary file (removed on drop)
    Temp(PathBuf),
}

impl ResolvedKey {
    /// Get path for the SSH library
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ResolvedKey::Path(p) | ResolvedKey::Temp(p) => Some(p),
            ResolvedKey::Agent => None,
        }
    }

    /// Whether to use the SSH agent
    #[must_use]
    pub fn use_agent(&self) -> bool {
        matches!(self, ResolvedKey::Agent)
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &PathBuf) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(KeyError::Io)?;
    let mode = metadata.permissions().mode();

    // group/other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, KeyError> {
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let temp_path = std::env::temp_dir().join(format!("oprelay_ssh_key_{}", std::process::id()));

    let mut file = File::create(&temp_path)?;
    file.write_all(key_data)?;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(&temp_path, permissions)?;

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}

impl Drop for ResolvedKey {
    fn drop(&mut self) {
        if let ResolvedKey::Temp(path) = self {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove temp key");
            }
        }
    }
}

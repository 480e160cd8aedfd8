//! Typed, overridable defaults shared across every component.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables threaded explicitly into component constructors rather than read
/// from ambient globals, so tests never depend on process state beyond the
/// home-directory resolution used by [`ClientConfig::default_auth_config_path`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub discovery_timeout: Duration,
    pub token_exchange_timeout: Duration,
    pub callback_timeout: Duration,
    pub download_chunk_size: usize,
    pub auth_config_path: PathBuf,
    pub tokens_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(30),
            token_exchange_timeout: Duration::from_secs(30),
            callback_timeout: Duration::from_secs(5 * 60),
            download_chunk_size: 32 * 1024,
            auth_config_path: default_auth_config_path(),
            tokens_path: default_tokens_path(),
        }
    }
}

#[cfg(target_os = "windows")]
fn storage_root() -> PathBuf {
    std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("NewStack")
        .join("Bluelink")
        .join("clients")
}

#[cfg(not(target_os = "windows"))]
fn storage_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bluelink")
        .join("clients")
}

pub fn default_auth_config_path() -> PathBuf {
    storage_root().join("plugins.auth.json")
}

pub fn default_tokens_path() -> PathBuf {
    storage_root().join("plugins.tokens.json")
}

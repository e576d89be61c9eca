//! Configuration for the CMS client context.

use crate::error::{GcnError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the configuration file inside a config directory.
pub const CONFIG_FILE: &str = "gcn.toml";

/// Comprehensive configuration for a client context.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Object cache behaviour.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Multichannelling defaults.
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl Settings {
    /// Load configuration from `dir/gcn.toml`, or defaults if the file is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| GcnError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| GcnError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Settings::default())
        }
    }

    /// Save configuration to `dir/gcn.toml`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| GcnError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| GcnError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Where the client runs. Changes how the session id is assembled at login.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Cookies are handled by the user agent; the sid is used as returned.
    #[default]
    Browser,
    /// No cookie jar; the session secret cookie is appended to the sid.
    Server,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Scheme and host of the CMS (default: `http://localhost`).
    pub base_url: String,

    /// Path prefix of the REST API (default: `/rest`).
    pub rest_path: String,

    /// Execution context (default: browser).
    pub execution_context: ExecutionContext,

    /// Cookie carrying the session secret (default: `GCN_SESSION_SECRET`).
    pub secret_cookie: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            rest_path: "/rest".to_string(),
            execution_context: ExecutionContext::Browser,
            secret_cookie: "GCN_SESSION_SECRET".to_string(),
        }
    }
}

/// Object cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Share one in-flight fetch between all requests for the same key (default: true).
    pub dedupe_in_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dedupe_in_flight: true,
        }
    }
}

/// Multichannelling defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChannelConfig {
    /// Channel used when a request does not name one (0 = no channel).
    pub default_channel: u32,
}

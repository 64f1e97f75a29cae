//! Configuration loading for linkgate.
//!
//! Configuration is loaded from an optional TOML file, then overridden from
//! the environment:
//! - `PORT`: HTTP port (default 3000)
//! - `PERSISTENT_DATA_PATH`: credentials live under `<path>/auth_info`
//!   (default `./auth_info`)

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the credentials directory inside `PERSISTENT_DATA_PATH`.
pub const AUTH_DIR_NAME: &str = "auth_info";

/// Root configuration for linkgate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Reconnect configuration.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Inbound message routing configuration.
    #[serde(default)]
    pub router: RouterConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// HTTP port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a single send, in seconds (default: 30).
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

/// Credential storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the credential set (default: auth_info).
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// How long a pairing challenge stays visible, in seconds (default: 60).
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u64,
}

/// Which reconnect policy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Reconnect immediately, forever.
    #[default]
    Immediate,
    /// Exponential backoff with jitter.
    Backoff,
}

/// Reconnect configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconnectConfig {
    /// Policy (default: immediate).
    #[serde(default)]
    pub policy: PolicyKind,
    /// Give up after this many consecutive failures (backoff only).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Inbound message routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Drop broadcast lists and status updates (default: true).
    #[serde(default = "default_ignore_broadcast")]
    pub ignore_broadcast: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_data_path() -> PathBuf {
    PathBuf::from(AUTH_DIR_NAME)
}

fn default_challenge_ttl_secs() -> u64 {
    60
}

fn default_ignore_broadcast() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            challenge_ttl_secs: default_challenge_ttl_secs(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ignore_broadcast: default_ignore_broadcast(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from `path` (or defaults) and apply process environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PORT` and `PERSISTENT_DATA_PATH` from `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port.clone(),
            })?;
        }

        if let Some(base) = lookup("PERSISTENT_DATA_PATH").filter(|v| !v.is_empty()) {
            self.storage.data_path = PathBuf::from(base).join(AUTH_DIR_NAME);
        }

        Ok(())
    }

    /// `bind_address:port` for the HTTP listener.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// The variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.send_timeout_secs, 30);
        assert_eq!(config.storage.data_path, PathBuf::from("auth_info"));
        assert_eq!(config.reconnect.policy, PolicyKind::Immediate);
        assert!(config.router.ignore_broadcast);
        assert_eq!(config.http_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "127.0.0.1"
port = 8080
send_timeout_secs = 5

[storage]
data_path = "/data/auth_info"
challenge_ttl_secs = 20

[reconnect]
policy = "backoff"
max_attempts = 12

[router]
ignore_broadcast = false
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.http_addr(), "127.0.0.1:8080");
        assert_eq!(config.server.send_timeout_secs, 5);
        assert_eq!(config.storage.data_path, PathBuf::from("/data/auth_info"));
        assert_eq!(config.storage.challenge_ttl_secs, 20);
        assert_eq!(config.reconnect.policy, PolicyKind::Backoff);
        assert_eq!(config.reconnect.max_attempts, Some(12));
        assert!(!config.router.ignore_broadcast);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let toml = r#"
[server]
port = 4000
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.storage.challenge_ttl_secs, 60);
        assert!(config.reconnect.max_attempts.is_none());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let toml = r#"
[reconnect]
policy = "sometimes"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn env_overrides_port_and_data_path() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("PORT", "8081"), ("PERSISTENT_DATA_PATH", "/var/lib/gate")]))
            .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(
            config.storage.data_path,
            PathBuf::from("/var/lib/gate").join("auth_info")
        );
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("PORT", ""), ("PERSISTENT_DATA_PATH", "")]))
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.data_path, PathBuf::from("auth_info"));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("PORT", "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "PORT", .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = Config::from_file(Path::new("/nonexistent/linkgate.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}

//! Bridge configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Time before giving up on server discovery, in milliseconds.
pub const DEFAULT_CONNECTION_TIME_OUT: u64 = 10_000;

/// Time before giving up on a response after a handshake, in milliseconds.
pub const DEFAULT_REQUEST_TIME_OUT: u64 = 5_000;

/// Environment variable names read by [`BridgeConfig::from_env`].
pub mod vars {
    pub const BRIDGE_BASE_URL: &str = "BRIDGE_BASE_URL";
    pub const BRIDGE_REQUEST_TIMEOUT_MS: &str = "BRIDGE_REQUEST_TIMEOUT_MS";
    pub const BRIDGE_CONNECTION_TIMEOUT_MS: &str = "BRIDGE_CONNECTION_TIMEOUT_MS";
    pub const BRIDGE_LOG_ERRORS: &str = "BRIDGE_LOG_ERRORS";
}

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Configuration used to build a [`Bridge`](crate::Bridge) and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Prefix joined in front of every relative route.
    pub base_url: Option<String>,
    /// Transport-level per-request timeout.
    pub timeout_ms: u64,
    /// Time allowed for a request to settle before it is aborted.
    pub connection_timeout_ms: u64,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// User agent string.
    pub user_agent: String,
    /// Log every failed request at error level.
    pub log_errors: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_REQUEST_TIME_OUT,
            connection_timeout_ms: DEFAULT_CONNECTION_TIME_OUT,
            headers: BTreeMap::new(),
            user_agent: format!("bridge-http/{}", env!("CARGO_PKG_VERSION")),
            log_errors: false,
        }
    }
}

impl BridgeConfig {
    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Transport-level request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connection (abort) timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Load a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Defaults overridden by `BRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(vars::BRIDGE_BASE_URL) {
            config.base_url = Some(url);
        }
        if let Some(ms) = env_millis(vars::BRIDGE_REQUEST_TIMEOUT_MS)? {
            config.timeout_ms = ms;
        }
        if let Some(ms) = env_millis(vars::BRIDGE_CONNECTION_TIMEOUT_MS)? {
            config.connection_timeout_ms = ms;
        }
        if let Ok(flag) = std::env::var(vars::BRIDGE_LOG_ERRORS) {
            config.log_errors = matches!(flag.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        Ok(config)
    }
}

fn env_millis(var: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("expected milliseconds, got {v:?}"),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.connection_timeout_ms, 10_000);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert!(config.base_url.is_none());
        assert!(config.user_agent.starts_with("bridge-http/"));
        assert!(!config.log_errors);
    }

    #[test]
    fn test_builder_helpers() {
        let config = BridgeConfig::default()
            .base_url("https://api.example.com")
            .header("x-api-key", "secret");
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.headers.get("x-api-key").map(String::as_str), Some("secret"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BridgeConfig::from_yaml_str(
            r#"
base_url: http://localhost:8080
timeout_ms: 250
headers:
  accept: application/json
"#,
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.connection_timeout_ms, DEFAULT_CONNECTION_TIME_OUT);
        assert_eq!(config.headers["accept"], "application/json");
    }

    #[test]
    fn test_invalid_yaml_reports_line() {
        let err = BridgeConfig::from_yaml_str("timeout_ms: [nope").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection_timeout_ms: 42").unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.connection_timeout_ms, 42);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BridgeConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_config_from_env() {
        let original: Vec<_> = [
            vars::BRIDGE_BASE_URL,
            vars::BRIDGE_REQUEST_TIMEOUT_MS,
            vars::BRIDGE_CONNECTION_TIMEOUT_MS,
            vars::BRIDGE_LOG_ERRORS,
        ]
        .iter()
        .map(|v| (*v, env::var(v).ok()))
        .collect();

        env::set_var(vars::BRIDGE_BASE_URL, "http://env.example");
        env::set_var(vars::BRIDGE_REQUEST_TIMEOUT_MS, "1500");
        env::set_var(vars::BRIDGE_CONNECTION_TIMEOUT_MS, "3000");
        env::set_var(vars::BRIDGE_LOG_ERRORS, "1");

        let config = BridgeConfig::from_env().unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://env.example"));
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.connection_timeout_ms, 3000);
        assert!(config.log_errors);

        env::set_var(vars::BRIDGE_CONNECTION_TIMEOUT_MS, "soon");
        let err = BridgeConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(vars::BRIDGE_CONNECTION_TIMEOUT_MS));

        for (var, value) in original {
            match value {
                Some(v) => env::set_var(var, v),
                None => env::remove_var(var),
            }
        }
    }
}

//! # Client Configuration
//!
//! Configuration management for the provisioning client library and CLI.
//! Supports environment variables, config files, and command-line overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Client configuration for the signup API, polling and CLI behavior
///
/// # Examples
///
/// ```rust
/// use tenant_provisioning::config::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.signup.base_url, "http://localhost:8000");
/// assert_eq!(config.polling.interval_ms, 2000);
/// assert_eq!(config.polling.timeout_ms, 120000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Signup API endpoint configuration
    pub signup: SignupEndpointConfig,
    /// Progress polling configuration
    #[serde(default)]
    pub polling: PollingConfig,
    /// CLI-specific settings
    #[serde(default)]
    pub cli: CliConfig,
}

/// Signup API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupEndpointConfig {
    /// Base URL of the web application (e.g., "<http://localhost:8000>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Anti-forgery token sent as `X-CSRF-TOKEN` (if required)
    pub csrf_token: Option<String>,
}

/// Poll cadence and overall wait bound for a provisioning job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between a status response and the next request
    pub interval_ms: u64,
    /// Wall-clock bound measured from the start of polling
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            timeout_ms: 120_000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// CLI-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default output format (table, json)
    pub default_format: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_format: "table".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signup: SignupEndpointConfig {
                base_url: "http://localhost:8000".to_string(),
                timeout_ms: 30000,
                csrf_token: None,
            },
            polling: PollingConfig::default(),
            cli: CliConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables and config file
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (./tenant-signup.toml, ~/.tenant-signup/config.toml, ...)
    /// 3. Default values
    pub fn load() -> ClientResult<Self> {
        let mut config = Self::find_config_file()
            .map(|path| Self::file_or_default(&path))
            .unwrap_or_default();

        config.apply_env_overrides();
        config.validate()?;

        debug!(
            base_url = %config.signup.base_url,
            poll_interval_ms = config.polling.interval_ms,
            poll_timeout_ms = config.polling.timeout_ms,
            csrf_token_set = config.signup.csrf_token.is_some(),
            "Loaded client configuration"
        );
        Ok(config)
    }

    /// Read a discovered config file, falling back to defaults when it is unusable
    fn file_or_default(path: &Path) -> Self {
        debug!("Loading config from: {}", path.display());
        Self::load_from_file(path).unwrap_or_else(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "Ignoring unreadable config file, using defaults"
            );
            Self::default()
        })
    }

    /// Load configuration from specific file, then apply environment overrides
    pub fn load_from_path(path: &Path) -> ClientResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::config_error(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ClientError::config_error(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut possible_paths = vec![
            PathBuf::from("./tenant-signup.toml"),
            PathBuf::from("./config/tenant-signup.toml"),
        ];
        if let Some(home) = dirs::home_dir() {
            possible_paths.push(home.join(".tenant-signup").join("config.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            possible_paths.push(config_dir.join("tenant-signup").join("client.toml"));
        }

        possible_paths
            .into_iter()
            .find(|path| path.exists() && path.is_file())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TENANT_SIGNUP_URL") {
            self.signup.base_url = url;
        }
        if let Some(timeout_ms) = lookup("TENANT_SIGNUP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.signup.timeout_ms = timeout_ms;
        }
        if let Some(token) = lookup("TENANT_SIGNUP_CSRF_TOKEN") {
            self.signup.csrf_token = Some(token);
        }
        if let Some(interval) =
            lookup("TENANT_SIGNUP_POLL_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.polling.interval_ms = interval;
        }
        if let Some(timeout) = lookup("TENANT_SIGNUP_POLL_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.polling.timeout_ms = timeout;
        }
        if let Some(format) = lookup("TENANT_SIGNUP_FORMAT") {
            self.cli.default_format = format;
        }
    }

    /// Check invariants the controller relies on
    pub fn validate(&self) -> ClientResult<()> {
        if self.signup.base_url.trim().is_empty() {
            return Err(ClientError::config_error("signup.base_url must not be empty"));
        }
        if self.polling.interval_ms == 0 {
            return Err(ClientError::config_error(
                "polling.interval_ms must be greater than zero",
            ));
        }
        if self.polling.timeout_ms < self.polling.interval_ms {
            return Err(ClientError::config_error(format!(
                "polling.timeout_ms ({}) must be at least polling.interval_ms ({})",
                self.polling.timeout_ms, self.polling.interval_ms
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::config_error(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ClientError::config_error(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ClientError::config_error(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Get default config file path
    pub fn default_config_path() -> ClientResult<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ClientError::config_error("Could not determine home directory"))?;

        Ok(home_dir.join(".tenant-signup").join("config.toml"))
    }
}

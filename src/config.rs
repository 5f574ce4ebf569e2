//! Configuration management for CampusChat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Every timing and retry constant used by the request pipeline lives here
//! so tests can substitute fast values instead of waiting on wall-clock
//! delays.

use crate::cli::Cli;
use crate::error::{CampusChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for CampusChat
///
/// This structure holds everything the chat pipeline needs: endpoint
/// settings, transport retry behavior, connectivity probing, and session
/// retry/replay behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Conversational endpoint configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Transport and connectivity configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Chat session behavior configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Conversational endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the conversational API, e.g. `http://115.190.93.105/v1/`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as `Authorization: Bearer <key>` on every request
    #[serde(default)]
    pub api_key: String,

    /// Stable user identifier sent with every chat turn
    #[serde(default = "default_user")]
    pub user: String,

    /// Per-attempt connect timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-attempt read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Per-attempt write timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://115.190.93.105/v1/".to_string()
}

fn default_user() -> String {
    "fixed_user".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            user: default_user(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Whole-request deadline as a [`Duration`].
    ///
    /// reqwest enforces a single deadline per request rather than separate
    /// read/write timers, so the read and write budgets are combined into
    /// one.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms + self.write_timeout_ms)
    }
}

/// DNS resolution strategy for the HTTP transport
///
/// `Ipv4Only` restricts resolution to IPv4 addresses. This is an
/// operational workaround for an IPv6 routing problem between the campus
/// network and the deployment environment; keep it the default until that
/// is resolved upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DnsMode {
    /// Use the system resolver unmodified
    System,
    /// Resolve hosts to their IPv4 addresses only
    Ipv4Only,
}

/// Transport and connectivity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Maximum transport attempts per logical request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed pause between transport attempts in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// DNS resolution strategy
    #[serde(default = "default_dns_mode")]
    pub dns: DnsMode,

    /// Address probed for reachability and latency, `host:port`
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Interval between background reachability checks in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

fn default_dns_mode() -> DnsMode {
    DnsMode::Ipv4Only
}

fn default_probe_addr() -> String {
    "8.8.8.8:53".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            dns: default_dns_mode(),
            probe_addr: default_probe_addr(),
            probe_timeout_ms: default_probe_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl NetworkConfig {
    /// Pause between transport attempts as a [`Duration`]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Probe timeout as a [`Duration`]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Background poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Chat session behavior configuration
///
/// The session retry budget is independent of the transport budget; one
/// logical user turn can therefore cost up to
/// `network.max_retries * (session.max_retries + 1)` attempts in the worst
/// case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum session-level retries after transient transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before each session-level retry in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_delay_ms: u64,

    /// Grace delay after connectivity returns before replaying in milliseconds
    #[serde(default = "default_reconnect_grace_ms")]
    pub reconnect_grace_ms: u64,

    /// Assistant greeting appended when a session starts
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Canned query used by the connection test
    #[serde(default = "default_test_query")]
    pub test_query: String,
}

fn default_reconnect_grace_ms() -> u64 {
    1_000
}

fn default_greeting() -> String {
    "Hi, I'm your campus assistant. How can I help you today?".to_string()
}

fn default_test_query() -> String {
    "connection test".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_interval_ms(),
            reconnect_grace_ms: default_reconnect_grace_ms(),
            greeting: default_greeting(),
            test_query: default_test_query(),
        }
    }
}

impl SessionConfig {
    /// Pause before each session-level retry as a [`Duration`]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Post-reconnect grace delay as a [`Duration`]
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file with CLI overrides applied
    ///
    /// A missing file is not an error: defaults are used so that the CLI
    /// works with nothing but `CAMPUSCHAT_API_KEY` set.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed CLI arguments whose overrides take precedence
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path);
            Self::default()
        };

        if let Some(api_key) = &cli.api_key {
            config.api.api_key = api_key.clone();
        }
        if let Some(api_url) = &cli.api_url {
            config.api.base_url = api_url.clone();
        }
        if let Some(user) = &cli.user {
            config.api.user = user.clone();
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`CampusChatError::Config`] if the base URL does not parse,
    /// the API key is empty, or a retry budget is zero.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            CampusChatError::Config(format!("invalid api.base_url {:?}: {}", self.api.base_url, e))
        })?;

        // Endpoint paths are joined onto the base; without the trailing
        // slash the last path segment would be silently replaced.
        if !self.api.base_url.ends_with('/') {
            return Err(CampusChatError::Config(format!(
                "api.base_url {:?} must end with a trailing slash",
                self.api.base_url
            ))
            .into());
        }

        if self.api.api_key.trim().is_empty() {
            return Err(CampusChatError::Config(
                "api.api_key is empty; set it in the config file or CAMPUSCHAT_API_KEY".to_string(),
            )
            .into());
        }

        if self.network.max_retries == 0 {
            return Err(
                CampusChatError::Config("network.max_retries must be at least 1".to_string())
                    .into(),
            );
        }

        if self.network.probe_addr.trim().is_empty() {
            return Err(
                CampusChatError::Config("network.probe_addr must not be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli_with_key() -> Cli {
        Cli {
            config: None,
            api_key: Some("app-test-key".to_string()),
            api_url: None,
            user: None,
            verbose: 0,
            command: None,
        }
    }

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.network.max_retries, 3);
        assert_eq!(config.network.retry_interval_ms, 2_000);
        assert_eq!(config.session.max_retries, 3);
        assert_eq!(config.session.reconnect_grace_ms, 1_000);
        assert_eq!(config.api.user, "fixed_user");
        assert_eq!(config.network.dns, DnsMode::Ipv4Only);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/config.yaml", &cli_with_key()).unwrap();
        assert_eq!(config.api.api_key, "app-test-key");
        assert_eq!(config.network.max_retries, 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api:\n  base_url: http://chat.example.edu/v1/\nnetwork:\n  max_retries: 5\n  dns: system\n"
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap(), &cli_with_key()).unwrap();
        assert_eq!(config.api.base_url, "http://chat.example.edu/v1/");
        assert_eq!(config.network.max_retries, 5);
        assert_eq!(config.network.dns, DnsMode::System);
        // Unspecified sections keep their defaults
        assert_eq!(config.session.max_retries, 3);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api:\n  api_key: from-file\n").unwrap();

        let mut cli = cli_with_key();
        cli.api_url = Some("http://override.example.edu/v1/".to_string());
        let config = Config::load(file.path().to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.api.api_key, "app-test-key");
        assert_eq!(config.api.base_url, "http://override.example.edu/v1/");
    }

    #[test]
    fn test_validate_rejects_empty_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.api.api_key = "key".to_string();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_base_url_without_trailing_slash() {
        let mut config = Config::default();
        config.api.api_key = "key".to_string();
        config.api.base_url = "http://chat.example.edu/v1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_transport_retries() {
        let mut config = Config::default();
        config.api.api_key = "key".to_string();
        config.network.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let mut config = Config::default();
        config.api.api_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_combines_read_and_write() {
        let api = ApiConfig {
            read_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
            ..ApiConfig::default()
        };
        assert_eq!(api.request_timeout(), Duration::from_millis(15_000));
    }
}

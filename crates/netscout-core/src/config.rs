//! Configuration management for netscout.
//!
//! This module provides a layered configuration system that supports:
//! - Loading from YAML files
//! - System and per-user configuration files
//! - Environment variable overrides (`NETSCOUT__SECTION__KEY`)
//! - Validation of all settings

use crate::discovery_config::{DiscoverySettings, MdnsSettings, SsdpSettings};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "NETSCOUT";

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use netscout_core::config::AppConfig;
///
/// // System file, user file, explicit file, then environment
/// let config = AppConfig::load(Some("netscout.yaml".as_ref())).unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Orchestrator settings
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Multicast DNS resolver settings
    #[serde(default)]
    pub mdns: MdnsSettings,

    /// SSDP resolver settings
    #[serde(default)]
    pub ssdp: SsdpSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    /// Loads configuration from the default locations.
    ///
    /// Sources, lowest precedence first:
    /// 1. `/etc/netscout/config.yaml` (optional)
    /// 2. `~/.netscout/config.yaml` (optional)
    /// 3. `explicit`, when given (required)
    /// 4. `NETSCOUT__*` environment variables
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_layered(&Self::default_paths(), explicit)
    }

    /// Loads configuration from optional `layers`, an optional required
    /// `explicit` file and the environment, using the `config` crate.
    pub fn load_layered(layers: &[PathBuf], explicit: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        for layer in layers {
            debug!(path = %layer.display(), "Adding optional config layer");
            builder = builder.add_source(config::File::from(layer.as_path()).required(false));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::file_not_found(path.display().to_string()));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let source = explicit
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: source,
                reason: e.to_string(),
            })?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::InvalidFormat {
                reason: e.to_string(),
            })
    }

    /// System-wide and per-user configuration file locations.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/netscout/config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netscout").join("config.yaml"));
        }
        paths
    }

    /// Validates the configuration.
    ///
    /// Protocol-specific checks (service name shape, bind address syntax)
    /// happen when the discovery crate builds resolver configurations.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.discovery.timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "discovery.timeout_ms",
                "cannot be 0",
            ));
        }

        if self.ssdp.wait_secs == 0 {
            return Err(ConfigError::invalid_value(
                "ssdp.wait_secs",
                "must be at least 1",
            ));
        }

        if self.ssdp.retry == 0 {
            return Err(ConfigError::invalid_value("ssdp.retry", "must be at least 1"));
        }

        self.logging.parse_level()?;

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Force debug level regardless of `level`
    #[serde(default)]
    pub development: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            development: false,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        if self.development {
            return Ok(Level::DEBUG);
        }

        self.level
            .parse()
            .map_err(|_| ConfigError::invalid_value("logging.level", format!("Invalid log level: {}", self.level)))
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery_config::IpFamily;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "netscout-{}-{}.yaml",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.discovery.timeout_ms, 1000);
        assert_eq!(config.mdns.domain, "local.");
        assert_eq!(config.mdns.ip_family, IpFamily::Both);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
discovery:
  timeout_ms: 2500
mdns:
  service: _http._tcp
  interfaces: [eth0, wlan0]
  ip_family: v4
ssdp:
  wait_secs: 3
  retry: 2
  server_contains: Sonos
  usn_contains: RINCON
logging:
  level: debug
  format: json
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.discovery.timeout_ms, 2500);
        assert_eq!(config.mdns.service, "_http._tcp");
        assert_eq!(config.mdns.domain, "local.");
        assert_eq!(config.mdns.interfaces, vec!["eth0", "wlan0"]);
        assert_eq!(config.mdns.ip_family, IpFamily::V4);
        assert_eq!(config.ssdp.retry, 2);
        assert_eq!(config.ssdp.server_contains.as_deref(), Some("Sonos"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.parse_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = AppConfig::from_yaml("discovery: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::InvalidFormat { .. })));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut config = AppConfig::default();
        config.discovery.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_retry() {
        let mut config = AppConfig::default();
        config.ssdp.retry = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "ssdp.retry"
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.development = true;
        assert_eq!(config.logging.parse_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_from_file_missing() {
        let result = AppConfig::from_file("/nonexistent/netscout.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_layered_load_explicit_overrides_layer() {
        let base = write_temp("base", "mdns:\n  service: _ipp._tcp\nssdp:\n  wait_secs: 5\n");
        let explicit = write_temp("explicit", "mdns:\n  service: _http._tcp\n");

        let config = AppConfig::load_layered(&[base.clone()], Some(&explicit)).unwrap();
        assert_eq!(config.mdns.service, "_http._tcp");
        assert_eq!(config.ssdp.wait_secs, 5);

        let _ = std::fs::remove_file(base);
        let _ = std::fs::remove_file(explicit);
    }

    #[test]
    fn test_layered_load_missing_layers_are_optional() {
        let missing = PathBuf::from("/nonexistent/netscout/config.yaml");
        let config = AppConfig::load_layered(&[missing], None).unwrap();
        assert_eq!(config.discovery.timeout_ms, 1000);
    }

    #[test]
    fn test_layered_load_missing_explicit_fails() {
        let missing = PathBuf::from("/nonexistent/netscout/explicit.yaml");
        let result = AppConfig::load_layered(&[], Some(&missing));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("NETSCOUT__LOGGING__FORMAT", "json");
        let config = AppConfig::load_layered(&[], None).unwrap();
        std::env::remove_var("NETSCOUT__LOGGING__FORMAT");

        assert_eq!(config.logging.format, LogFormat::Json);
    }
}

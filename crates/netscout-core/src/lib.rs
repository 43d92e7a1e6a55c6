//! # netscout core
//!
//! Configuration and configuration errors shared by the netscout crates.
//!
//! - **Configuration**: [`AppConfig`] is loaded from layered YAML files and
//!   `NETSCOUT__*` environment variables through the `config` crate. Its
//!   `mdns` and `ssdp` sections are the option sources the discovery crate
//!   turns into validated resolver configurations.
//! - **Errors**: [`ConfigError`] covers load, parse and validation failures.
//!
//! ## Example
//!
//! ```
//! use netscout_core::AppConfig;
//!
//! let config = AppConfig::from_yaml("mdns:\n  service: _http._tcp\n").unwrap();
//! assert_eq!(config.mdns.service, "_http._tcp");
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod discovery_config;
pub mod error;

pub use config::{AppConfig, LogFormat, LoggingConfig};
pub use discovery_config::{DiscoverySettings, IpFamily, MdnsSettings, SsdpSettings};
pub use error::{ConfigError, Result};

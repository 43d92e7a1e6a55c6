//! Configuration types for service discovery
//!
//! These are the serde-facing option sources. The discovery crate turns them
//! into validated resolver configurations before any network I/O starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the discovery orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Upper bound for one discovery call (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DiscoverySettings {
    /// Returns the discovery timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// IP protocol versions used for multicast DNS traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpFamily {
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
    /// Both IPv4 and IPv6
    #[default]
    Both,
}

impl IpFamily {
    /// Whether IPv4 traffic is enabled
    pub fn includes_v4(&self) -> bool {
        matches!(self, IpFamily::V4 | IpFamily::Both)
    }

    /// Whether IPv6 traffic is enabled
    pub fn includes_v6(&self) -> bool {
        matches!(self, IpFamily::V6 | IpFamily::Both)
    }
}

/// Multicast DNS resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdnsSettings {
    /// Service to browse for (e.g. `_http._tcp`)
    #[serde(default)]
    pub service: String,

    /// Browse domain
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Network interface names to bind (empty = all)
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// IP protocol versions to use
    #[serde(default)]
    pub ip_family: IpFamily,
}

impl Default for MdnsSettings {
    fn default() -> Self {
        Self {
            service: String::new(),
            domain: default_domain(),
            interfaces: Vec::new(),
            ip_family: IpFamily::Both,
        }
    }
}

/// SSDP resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsdpSettings {
    /// Seconds to wait for responses in each search round
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Number of search rounds
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Local address to bind (`ip` or `ip:port`, empty = any)
    #[serde(default)]
    pub local_address: String,

    /// Search target sent in the `ST` header
    #[serde(default = "default_search_target")]
    pub search_target: String,

    /// Only keep responses whose `SERVER` header contains this
    #[serde(default)]
    pub server_contains: Option<String>,

    /// Only keep responses whose `USN` header contains this
    #[serde(default)]
    pub usn_contains: Option<String>,

    /// Log every datagram sent and received at debug level
    #[serde(default)]
    pub trace_packets: bool,
}

impl Default for SsdpSettings {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
            retry: default_retry(),
            local_address: String::new(),
            search_target: default_search_target(),
            server_contains: None,
            usn_contains: None,
            trace_packets: false,
        }
    }
}

// Default configuration values
fn default_timeout_ms() -> u64 {
    1000
}

fn default_domain() -> String {
    "local.".to_string()
}

fn default_wait_secs() -> u64 {
    2
}

fn default_retry() -> u32 {
    1
}

fn default_search_target() -> String {
    "upnp:rootdevice".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(DiscoverySettings::default().timeout(), Duration::from_secs(1));
        assert_eq!(MdnsSettings::default().domain, "local.");

        let ssdp = SsdpSettings::default();
        assert_eq!(ssdp.wait_secs, 2);
        assert_eq!(ssdp.retry, 1);
        assert_eq!(ssdp.search_target, "upnp:rootdevice");
        assert!(ssdp.local_address.is_empty());
    }

    #[test]
    fn test_ip_family() {
        assert!(IpFamily::Both.includes_v4() && IpFamily::Both.includes_v6());
        assert!(!IpFamily::V4.includes_v6());
        assert!(!IpFamily::V6.includes_v4());
        assert_eq!(IpFamily::default(), IpFamily::Both);
    }

    #[test]
    fn test_ip_family_serde() {
        let family: IpFamily = serde_json::from_str("\"v6\"").unwrap();
        assert_eq!(family, IpFamily::V6);
    }
}

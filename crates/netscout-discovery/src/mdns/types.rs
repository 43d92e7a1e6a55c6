//! Raw multicast DNS service records

use mdns_sd::ServiceInfo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// One resolved service instance, as reported by the browse session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    /// Instance name (e.g. "Living Room")
    pub name: String,

    /// Fully qualified instance name
    pub full_name: String,

    /// Service type including domain (e.g. "_http._tcp.local.")
    pub service_type: String,

    /// Host name of the responder
    pub host_name: String,

    /// Addresses, IPv4 first
    pub addresses: Vec<IpAddr>,

    /// Service port
    pub port: u16,

    /// TXT record properties
    pub properties: BTreeMap<String, String>,
}

impl ServiceEntry {
    /// Creates an entry with no addresses or properties.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        let name = name.into();
        let service_type = service_type.into();
        Self {
            full_name: format!("{}.{}", name, service_type),
            name,
            service_type,
            host_name: String::new(),
            addresses: Vec::new(),
            port: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Returns the primary address (prefer IPv4)
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| self.addresses.first())
            .copied()
    }

    /// Returns the socket address of the primary address and port
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.primary_address()
            .map(|addr| SocketAddr::new(addr, self.port))
    }

    /// Gets a TXT property by key
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }
}

impl From<&ServiceInfo> for ServiceEntry {
    fn from(info: &ServiceInfo) -> Self {
        let service_type = info.get_type().to_string();
        let full_name = info.get_fullname().to_string();
        let name = instance_name(&full_name, &service_type);

        let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        addresses.sort_by_key(|addr| (addr.is_ipv6(), *addr));

        let properties = info
            .get_properties()
            .iter()
            .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
            .collect();

        Self {
            name,
            full_name,
            service_type,
            host_name: info.get_hostname().to_string(),
            addresses,
            port: info.get_port(),
            properties,
        }
    }
}

impl fmt::Display for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Some(addr) => write!(f, "{} ({})", self.name, addr),
            None => write!(f, "{} ({}:{})", self.name, self.host_name, self.port),
        }
    }
}

/// Strips the service type from a fully qualified instance name.
fn instance_name(full_name: &str, service_type: &str) -> String {
    full_name
        .strip_suffix(service_type)
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or(full_name)
        .to_string()
}

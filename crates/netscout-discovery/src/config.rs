//! Configuration types for service discovery
//!
//! Re-exports the option sources from netscout-core so callers can build
//! resolver configurations without depending on it directly.

pub use netscout_core::discovery_config::{DiscoverySettings, IpFamily, MdnsSettings, SsdpSettings};

//! Network service discovery over multicast DNS and SSDP
//!
//! This crate runs one protocol-specific resolver under a timeout and
//! streams what it finds to the caller:
//! - [`MdnsResolver`] browses for a DNS-SD service type (RFC 6762/6763)
//! - [`SsdpResolver`] sends `M-SEARCH` rounds and collects the responses
//! - [`Discover`] wraps either one with a timeout and cancellation
//!
//! # Architecture
//!
//! Every resolve call runs two tasks joined by a small bounded channel:
//! 1. A protocol producer that talks to the network and emits raw records
//! 2. A relay that applies the caller's [`Transform`] and forwards results
//!
//! Both observe one cancellation token. The caller's channel closes exactly
//! once, after both tasks have finished, and then the call returns its
//! result. Hitting the timeout or cancelling the parent token is a graceful
//! stop and returns `Ok(())`.
//!
//! # Example
//!
//! ```no_run
//! use netscout_discovery::{Discover, Discoverer, SsdpConfig, SsdpResolver};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> netscout_discovery::Result<()> {
//!     let config = SsdpConfig::builder().wait_secs(1).build()?;
//!     let resolver = SsdpResolver::new(config).with_transform(|s| Ok(s.location));
//!
//!     let locations = Discover::new(resolver)
//!         .collect(&CancellationToken::new())
//!         .await?;
//!
//!     for location in locations {
//!         println!("{}", location);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discover;
pub mod error;
pub mod mdns;
mod relay;
pub mod ssdp;
pub mod transform;

pub use config::IpFamily;
pub use discover::{Discover, Discoverer, Resolver, DEFAULT_TIMEOUT};
pub use error::{BoxError, DiscoveryError, Result};
pub use mdns::{Browse, MdnsConfig, MdnsResolver, MdnsSdBrowser, ServiceEntry};
pub use ssdp::{Search, SsdpConfig, SsdpResolver, SsdpService, UdpSearcher};
pub use transform::{Filter, Transform};

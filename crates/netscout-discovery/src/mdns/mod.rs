//! Multicast DNS resolver
//!
//! A deliberately small mDNS client: it browses for one service type for
//! as long as the discovery call lasts and reports every resolved instance.
//! Repeated announcements are reported again and removals are ignored.

mod browser;
mod types;

pub use browser::{Browse, MdnsSdBrowser};
pub use types::ServiceEntry;

use crate::config::{IpFamily, MdnsSettings};
use crate::discover::Resolver;
use crate::error::{BoxError, DiscoveryError, Result};
use crate::relay::{run_pair, RELAY_CAPACITY};
use crate::transform::Transform;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(crate) const PROTOCOL: &str = "mdns";

/// The only domain multicast DNS browses in
pub const LOCAL_DOMAIN: &str = "local.";

/// Validated multicast DNS resolver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnsConfig {
    service: String,
    domain: String,
    interfaces: Vec<String>,
    ip_family: IpFamily,
}

impl MdnsConfig {
    /// Starts building a configuration.
    pub fn builder() -> MdnsConfigBuilder {
        MdnsConfigBuilder::default()
    }

    /// Builds a configuration from loaded settings.
    pub fn from_settings(settings: &MdnsSettings) -> Result<Self> {
        Self::builder()
            .service(settings.service.as_str())
            .domain(settings.domain.as_str())
            .interfaces(settings.interfaces.iter().cloned())
            .ip_family(settings.ip_family)
            .build()
    }

    /// Service name (e.g. `_http._tcp`)
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Browse domain, always dot-terminated
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Interface names to bind; empty means all
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// IP protocol versions in use
    pub fn ip_family(&self) -> IpFamily {
        self.ip_family
    }

    /// Service type with domain, as queried on the wire
    pub fn service_type(&self) -> String {
        format!("{}.{}", self.service, self.domain)
    }
}

/// Builder for [`MdnsConfig`]
#[derive(Debug, Clone)]
pub struct MdnsConfigBuilder {
    service: String,
    domain: String,
    interfaces: Vec<String>,
    ip_family: IpFamily,
}

impl Default for MdnsConfigBuilder {
    fn default() -> Self {
        Self {
            service: String::new(),
            domain: LOCAL_DOMAIN.to_string(),
            interfaces: Vec::new(),
            ip_family: IpFamily::Both,
        }
    }
}

impl MdnsConfigBuilder {
    /// Sets the service name to browse for
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sets the browse domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Adds one interface by name
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    /// Adds several interfaces by name
    pub fn interfaces<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interfaces.extend(names.into_iter().map(Into::into));
        self
    }

    /// Selects the IP protocol versions
    pub fn ip_family(mut self, ip_family: IpFamily) -> Self {
        self.ip_family = ip_family;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<MdnsConfig> {
        let service = self.service.trim().trim_end_matches('.').to_string();
        if service.is_empty() {
            return Err(DiscoveryError::config(PROTOCOL, "service name cannot be empty"));
        }
        if !service.starts_with('_') {
            return Err(DiscoveryError::config(
                PROTOCOL,
                format!("service name '{}' must start with '_'", service),
            ));
        }
        if !(service.ends_with("._tcp") || service.ends_with("._udp")) {
            return Err(DiscoveryError::config(
                PROTOCOL,
                format!("service name '{}' must end with ._tcp or ._udp", service),
            ));
        }

        let mut domain = self.domain.trim().to_string();
        if domain.is_empty() {
            domain = LOCAL_DOMAIN.to_string();
        } else if !domain.ends_with('.') {
            domain.push('.');
        }
        if !domain.eq_ignore_ascii_case(LOCAL_DOMAIN) {
            return Err(DiscoveryError::config(
                PROTOCOL,
                format!("unsupported domain '{}', only '{}' can be browsed", domain, LOCAL_DOMAIN),
            ));
        }

        if self.interfaces.iter().any(|name| name.trim().is_empty()) {
            return Err(DiscoveryError::config(PROTOCOL, "interface name cannot be empty"));
        }

        Ok(MdnsConfig {
            service,
            domain: LOCAL_DOMAIN.to_string(),
            interfaces: self.interfaces,
            ip_family: self.ip_family,
        })
    }
}

/// Discovers services advertised over multicast DNS.
///
/// Results are [`ServiceEntry`] values unless a transform is attached with
/// [`MdnsResolver::with_transform`].
pub struct MdnsResolver<T = ServiceEntry> {
    config: MdnsConfig,
    transform: Transform<ServiceEntry, T>,
    browser: Arc<dyn Browse>,
}

impl MdnsResolver<ServiceEntry> {
    /// Creates a resolver that reports raw entries.
    pub fn new(config: MdnsConfig) -> Self {
        Self {
            config,
            transform: Transform::identity(),
            browser: Arc::new(MdnsSdBrowser),
        }
    }
}

impl<T> MdnsResolver<T> {
    /// Replaces the transform applied to each entry.
    pub fn with_transform<U, F>(self, f: F) -> MdnsResolver<U>
    where
        F: Fn(ServiceEntry) -> std::result::Result<U, BoxError> + Send + Sync + 'static,
    {
        MdnsResolver {
            config: self.config,
            transform: Transform::new(f),
            browser: self.browser,
        }
    }

    /// Replaces the browse session implementation.
    pub fn with_browser(mut self, browser: impl Browse + 'static) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    /// Returns the resolver configuration
    pub fn config(&self) -> &MdnsConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for MdnsResolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdnsResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Resolver for MdnsResolver<T>
where
    T: Send + 'static,
{
    type Item = T;

    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    async fn resolve(&self, cancel: CancellationToken, discovered: mpsc::Sender<T>) -> Result<()> {
        info!(
            service_type = %self.config.service_type(),
            interfaces = ?self.config.interfaces(),
            ip_family = ?self.config.ip_family(),
            "Starting mDNS resolve"
        );

        let group = cancel.child_token();
        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);

        let browse = self.browser.browse(&self.config, group.clone(), tx);

        run_pair(browse, rx, &self.transform, discovered, group).await
    }
}

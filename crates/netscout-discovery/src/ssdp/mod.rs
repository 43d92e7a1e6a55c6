//! Simple Service Discovery Protocol resolver
//!
//! Runs up to `retry` sequential search rounds, each a fresh `M-SEARCH`
//! that collects responses for `wait` seconds. Cancellation is checked
//! before every round and inside a round, so teardown is prompt.

mod message;
mod search;

pub use message::{search_request, SsdpService, MAX_MX, MULTICAST_ADDR};
pub use search::{Search, UdpSearcher, WIRE_TARGET};

use crate::config::SsdpSettings;
use crate::discover::Resolver;
use crate::error::{BoxError, DiscoveryError, Result};
use crate::relay::{emit, run_pair, RELAY_CAPACITY};
use crate::transform::{Filter, Transform};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) const PROTOCOL: &str = "ssdp";

/// Search target used when none is configured
pub const DEFAULT_SEARCH_TARGET: &str = "upnp:rootdevice";

/// Validated SSDP resolver configuration
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    wait: Duration,
    retry: u32,
    local_addr: SocketAddr,
    search_target: String,
    trace_packets: bool,
    filter: Filter<SsdpService>,
}

impl SsdpConfig {
    /// Starts building a configuration.
    pub fn builder() -> SsdpConfigBuilder {
        SsdpConfigBuilder::default()
    }

    /// Builds a configuration from loaded settings.
    ///
    /// Non-empty `server_contains` / `usn_contains` become the entry filter.
    pub fn from_settings(settings: &SsdpSettings) -> Result<Self> {
        let mut builder = Self::builder()
            .wait_secs(settings.wait_secs)
            .retry(settings.retry)
            .local_address(settings.local_address.as_str())
            .search_target(settings.search_target.as_str())
            .trace_packets(settings.trace_packets);

        let server = settings.server_contains.as_deref().unwrap_or_default();
        let usn = settings.usn_contains.as_deref().unwrap_or_default();
        if !server.is_empty() || !usn.is_empty() {
            builder = builder.filter(Filter::server_and_usn(server, usn));
        }

        builder.build()
    }

    /// Response window of each round
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Number of search rounds
    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Local address searches are sent from
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// ST header value
    pub fn search_target(&self) -> &str {
        &self.search_target
    }

    /// Whether raw datagrams are logged
    pub fn trace_packets(&self) -> bool {
        self.trace_packets
    }

    /// Filter applied to each response
    pub fn filter(&self) -> &Filter<SsdpService> {
        &self.filter
    }
}

/// Builder for [`SsdpConfig`]
#[derive(Debug, Clone)]
pub struct SsdpConfigBuilder {
    wait_secs: u64,
    retry: u32,
    local_address: String,
    search_target: String,
    trace_packets: bool,
    filter: Filter<SsdpService>,
}

impl Default for SsdpConfigBuilder {
    fn default() -> Self {
        Self {
            wait_secs: 2,
            retry: 1,
            local_address: String::new(),
            search_target: DEFAULT_SEARCH_TARGET.to_string(),
            trace_packets: false,
            filter: Filter::accept_all(),
        }
    }
}

impl SsdpConfigBuilder {
    /// Sets the response window of each round in seconds
    pub fn wait_secs(mut self, secs: u64) -> Self {
        self.wait_secs = secs;
        self
    }

    /// Sets the number of search rounds
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the local bind address (`ip` or `ip:port`, empty for any)
    pub fn local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = address.into();
        self
    }

    /// Sets the ST header value
    pub fn search_target(mut self, target: impl Into<String>) -> Self {
        self.search_target = target.into();
        self
    }

    /// Enables logging of raw datagrams
    pub fn trace_packets(mut self, enabled: bool) -> Self {
        self.trace_packets = enabled;
        self
    }

    /// Sets the filter applied to each response
    pub fn filter(mut self, filter: Filter<SsdpService>) -> Self {
        self.filter = filter;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<SsdpConfig> {
        if self.wait_secs < 1 {
            return Err(DiscoveryError::config(PROTOCOL, "wait must be at least 1 second"));
        }
        if self.retry < 1 {
            return Err(DiscoveryError::config(PROTOCOL, "retry must be at least 1"));
        }

        let search_target = self.search_target.trim();
        let search_target = if search_target.is_empty() {
            DEFAULT_SEARCH_TARGET.to_string()
        } else {
            search_target.to_string()
        };

        Ok(SsdpConfig {
            wait: Duration::from_secs(self.wait_secs),
            retry: self.retry,
            local_addr: parse_local_address(&self.local_address)?,
            search_target,
            trace_packets: self.trace_packets,
            filter: self.filter,
        })
    }
}

/// Parses `ip` or `ip:port`; empty means any interface, ephemeral port.
fn parse_local_address(address: &str) -> Result<SocketAddr> {
    let address = address.trim();
    if address.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0));
    }

    let addr = address
        .parse::<SocketAddr>()
        .or_else(|_| address.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, 0)))
        .map_err(|_| {
            DiscoveryError::config(PROTOCOL, format!("invalid local address '{}'", address))
        })?;

    if !addr.is_ipv4() {
        return Err(DiscoveryError::config(
            PROTOCOL,
            format!("local address '{}' must be IPv4", address),
        ));
    }
    Ok(addr)
}

impl Filter<SsdpService> {
    /// Keeps responses whose SERVER banner contains `server` and whose USN
    /// contains `usn`.
    pub fn server_and_usn(server: impl Into<String>, usn: impl Into<String>) -> Self {
        let server = server.into();
        let usn = usn.into();
        Filter::new(move |service: &SsdpService| {
            service.server.contains(&server) && service.usn.contains(&usn)
        })
    }
}

/// Discovers devices answering SSDP searches.
///
/// Results are [`SsdpService`] values unless a transform is attached with
/// [`SsdpResolver::with_transform`].
pub struct SsdpResolver<T = SsdpService> {
    config: SsdpConfig,
    transform: Transform<SsdpService, T>,
    searcher: Arc<dyn Search>,
}

impl SsdpResolver<SsdpService> {
    /// Creates a resolver that reports raw responses.
    pub fn new(config: SsdpConfig) -> Self {
        Self {
            config,
            transform: Transform::identity(),
            searcher: Arc::new(UdpSearcher),
        }
    }
}

impl<T> SsdpResolver<T> {
    /// Replaces the transform applied to each response.
    pub fn with_transform<U, F>(self, f: F) -> SsdpResolver<U>
    where
        F: Fn(SsdpService) -> std::result::Result<U, BoxError> + Send + Sync + 'static,
    {
        SsdpResolver {
            config: self.config,
            transform: Transform::new(f),
            searcher: self.searcher,
        }
    }

    /// Replaces the response filter.
    pub fn with_filter(mut self, filter: Filter<SsdpService>) -> Self {
        self.config.filter = filter;
        self
    }

    /// Replaces the search round implementation.
    pub fn with_searcher(mut self, searcher: impl Search + 'static) -> Self {
        self.searcher = Arc::new(searcher);
        self
    }

    /// Returns the resolver configuration
    pub fn config(&self) -> &SsdpConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for SsdpResolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsdpResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Resolver for SsdpResolver<T>
where
    T: Send + 'static,
{
    type Item = T;

    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    async fn resolve(&self, cancel: CancellationToken, discovered: mpsc::Sender<T>) -> Result<()> {
        info!(
            search_target = %self.config.search_target(),
            wait_secs = self.config.wait().as_secs(),
            retry = self.config.retry(),
            local_addr = %self.config.local_addr(),
            "Starting SSDP resolve"
        );

        let group = cancel.child_token();
        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);

        let rounds = search_rounds(self.searcher.as_ref(), &self.config, group.clone(), tx);

        run_pair(rounds, rx, &self.transform, discovered, group).await
    }
}

/// Runs the configured search rounds and emits every accepted response.
async fn search_rounds(
    searcher: &dyn Search,
    config: &SsdpConfig,
    cancel: CancellationToken,
    entries: mpsc::Sender<SsdpService>,
) -> Result<()> {
    for attempt in 1..=config.retry() {
        if cancel.is_cancelled() {
            debug!(attempt, "Cancelled before SSDP search round");
            return Ok(());
        }

        debug!(attempt, retry = config.retry(), "Starting SSDP search round");
        let services = searcher.search(config, &cancel).await?;

        for service in services {
            if !config.filter().matches(&service) {
                debug!(usn = %service.usn, server = %service.server, "Filtered out");
                continue;
            }
            if !emit(&entries, service, &cancel).await {
                return Ok(());
            }
        }
    }

    Ok(())
}

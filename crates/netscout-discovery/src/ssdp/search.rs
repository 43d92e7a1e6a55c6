//! SSDP search rounds over UDP

use super::message::{search_request, SsdpService, MULTICAST_ADDR};
use super::{SsdpConfig, PROTOCOL};
use crate::error::{DiscoveryError, Result};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Largest datagram accepted from a responder
const MAX_DATAGRAM_SIZE: usize = 8192;

/// Multicast TTL for outgoing searches
const MULTICAST_TTL: u32 = 2;

/// Log target for raw datagrams when packet tracing is on
pub const WIRE_TARGET: &str = "netscout::ssdp::wire";

/// One SSDP search round.
///
/// Implementations send a single search and return every response received
/// within `config.wait()`, or what was gathered so far once `cancel` fires.
#[async_trait]
pub trait Search: Send + Sync {
    /// Runs one round for `config.search_target()`.
    async fn search(
        &self,
        config: &SsdpConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<SsdpService>>;
}

/// Search round over a freshly bound UDP socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpSearcher;

#[async_trait]
impl Search for UdpSearcher {
    async fn search(
        &self,
        config: &SsdpConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<SsdpService>> {
        search_at(config, cancel, SocketAddr::V4(MULTICAST_ADDR)).await
    }
}

/// Sends one search to `target` and gathers responses until the wait
/// window closes or `cancel` fires.
pub(crate) async fn search_at(
    config: &SsdpConfig,
    cancel: &CancellationToken,
    target: SocketAddr,
) -> Result<Vec<SsdpService>> {
    let socket = bind(config.local_addr())?;
    let request = search_request(config.search_target(), config.wait().as_secs());

    if config.trace_packets() {
        debug!(target: WIRE_TARGET, to = %target, packet = %request, "Sending datagram");
    }

    socket
        .send_to(request.as_bytes(), target)
        .await
        .map_err(|e| DiscoveryError::transport(PROTOCOL, format!("cannot send search: {}", e)))?;

    let deadline = Instant::now() + config.wait();
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut services = Vec::new();

    loop {
        let (len, from) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => break,
            received = socket.recv_from(&mut buffer) => received.map_err(|e| {
                DiscoveryError::transport(PROTOCOL, format!("receive failed: {}", e))
            })?,
        };

        let datagram = &buffer[..len];
        if config.trace_packets() {
            debug!(
                target: WIRE_TARGET,
                from = %from,
                packet = %String::from_utf8_lossy(datagram),
                "Received datagram"
            );
        }

        match SsdpService::parse(datagram, Some(from)) {
            Ok(service) => services.push(service),
            Err(e) => debug!(from = %from, error = %e, "Skipping SSDP datagram"),
        }
    }

    debug!(responses = services.len(), "SSDP search round finished");
    Ok(services)
}

/// Binds an IPv4 UDP socket on `local_addr` for one search round.
fn bind(local_addr: SocketAddr) -> Result<UdpSocket> {
    let map_err = |e: std::io::Error| {
        DiscoveryError::transport(PROTOCOL, format!("cannot open socket on {}: {}", local_addr, e))
    };

    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(map_err)?;

    if let IpAddr::V4(ip) = local_addr.ip() {
        if !ip.is_unspecified() {
            socket.set_multicast_if_v4(&ip).map_err(map_err)?;
        }
    }
    socket.set_multicast_ttl_v4(MULTICAST_TTL).map_err(map_err)?;

    socket.set_nonblocking(true).map_err(map_err)?;
    socket.bind(&local_addr.into()).map_err(map_err)?;

    UdpSocket::from_std(socket.into()).map_err(map_err)
}

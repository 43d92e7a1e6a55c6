//! Multicast DNS browse sessions

use super::types::ServiceEntry;
use super::{MdnsConfig, PROTOCOL};
use crate::config::IpFamily;
use crate::error::{DiscoveryError, Result};
use crate::relay::emit;
use async_trait::async_trait;
use mdns_sd::{IfKind, Receiver, ServiceDaemon, ServiceEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One multicast DNS browse session.
///
/// Implementations send each resolved entry to `entries` until `cancel`
/// fires or the session ends, then return. Dropping `entries` on return is
/// what lets the relay task drain and finish.
#[async_trait]
pub trait Browse: Send + Sync {
    /// Browses for `config.service_type()` on the configured interfaces.
    async fn browse(
        &self,
        config: &MdnsConfig,
        cancel: CancellationToken,
        entries: mpsc::Sender<ServiceEntry>,
    ) -> Result<()>;
}

/// Browse session backed by the `mdns-sd` daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdnsSdBrowser;

#[async_trait]
impl Browse for MdnsSdBrowser {
    async fn browse(
        &self,
        config: &MdnsConfig,
        cancel: CancellationToken,
        entries: mpsc::Sender<ServiceEntry>,
    ) -> Result<()> {
        let service_type = config.service_type();

        let daemon = ServiceDaemon::new().map_err(|e| {
            DiscoveryError::transport(PROTOCOL, format!("cannot create mDNS daemon: {}", e))
        })?;

        let result = match select_interfaces(&daemon, config) {
            Ok(()) => match daemon.browse(&service_type) {
                Ok(receiver) => {
                    debug!(service_type = %service_type, "Browsing");
                    let result = pump(&receiver, &cancel, &entries).await;
                    if let Err(e) = daemon.stop_browse(&service_type) {
                        debug!(error = %e, "Failed to stop mDNS browse");
                    }
                    result
                }
                Err(e) => Err(DiscoveryError::transport(
                    PROTOCOL,
                    format!("cannot browse for '{}': {}", service_type, e),
                )),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "Failed to shut down mDNS daemon");
        }

        result
    }
}

/// Restricts the daemon to the configured interfaces and IP family.
///
/// Later rules override earlier ones inside the daemon, so interface names
/// are enabled before the unwanted family is disabled.
fn select_interfaces(daemon: &ServiceDaemon, config: &MdnsConfig) -> Result<()> {
    let map_err = |e: mdns_sd::Error| {
        DiscoveryError::transport(PROTOCOL, format!("cannot select interfaces: {}", e))
    };

    if !config.interfaces().is_empty() {
        daemon.disable_interface(IfKind::All).map_err(map_err)?;
        let names: Vec<IfKind> = config
            .interfaces()
            .iter()
            .map(|name| IfKind::Name(name.clone()))
            .collect();
        daemon.enable_interface(names).map_err(map_err)?;
    }

    for kind in excluded_families(config.ip_family()) {
        daemon.disable_interface(kind).map_err(map_err)?;
    }
    Ok(())
}

/// Interface kinds to switch off for `family`.
fn excluded_families(family: IpFamily) -> Vec<IfKind> {
    let mut kinds = Vec::new();
    if !family.includes_v4() {
        kinds.push(IfKind::IPv4);
    }
    if !family.includes_v6() {
        kinds.push(IfKind::IPv6);
    }
    kinds
}

/// Forwards resolved services until cancelled or the daemon stops.
async fn pump(
    receiver: &Receiver<ServiceEvent>,
    cancel: &CancellationToken,
    entries: &mpsc::Sender<ServiceEntry>,
) -> Result<()> {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            event = receiver.recv_async() => match event {
                Ok(event) => event,
                Err(_) => {
                    debug!("mDNS browse channel closed");
                    return Ok(());
                }
            },
        };

        match event {
            ServiceEvent::ServiceResolved(info) => {
                let entry = ServiceEntry::from(&info);
                debug!(
                    service = %entry.full_name,
                    host = %entry.host_name,
                    port = entry.port,
                    "Service resolved"
                );

                if !emit(entries, entry, cancel).await {
                    return Ok(());
                }
            }
            ServiceEvent::SearchStarted(ty) => {
                trace!(service_type = %ty, "Search started");
            }
            ServiceEvent::ServiceRemoved(_, fullname) => {
                trace!(service = %fullname, "Service removed");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_families() {
        assert!(excluded_families(IpFamily::Both).is_empty());
        assert!(matches!(excluded_families(IpFamily::V4).as_slice(), [IfKind::IPv6]));
        assert!(matches!(excluded_families(IpFamily::V6).as_slice(), [IfKind::IPv4]));
    }
}

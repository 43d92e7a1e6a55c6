//! Smoke test: configuration file to finished discovery run

mod common;

use common::{load_fixture_config, ssdp_device, StaticAnnouncements, StaticDevices};
use netscout_core::{IpFamily, LogFormat};
use netscout_discovery::{
    Discover, Discoverer, MdnsConfig, MdnsResolver, SsdpConfig, SsdpResolver,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_fixture_config_loads() {
    let config = load_fixture_config();
    config.validate().expect("fixture config is valid");

    assert_eq!(config.discovery.timeout(), Duration::from_millis(1500));
    assert_eq!(config.mdns.ip_family, IpFamily::V4);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.ssdp.server_contains.as_deref(), Some("Sonos"));
}

#[tokio::test(start_paused = true)]
async fn test_ssdp_discovery_from_config() {
    let config = load_fixture_config();
    let ssdp = SsdpConfig::from_settings(&config.ssdp).expect("valid SSDP settings");

    let resolver = SsdpResolver::new(ssdp)
        .with_searcher(StaticDevices(vec![
            ssdp_device(
                "uuid:RINCON_000E58A0B1C201400::upnp:rootdevice",
                "Linux UPnP/1.0 Sonos/70.3-35220 (ZPS1)",
            ),
            ssdp_device("uuid:2fac1234-31f8-11b4-a222-08002b34c003", "Roku/9.4 UPnP/1.0"),
        ]))
        .with_transform(|device| Ok(device.usn));

    let found = Discover::from_settings(resolver, &config.discovery)
        .collect(&CancellationToken::new())
        .await
        .expect("discovery succeeds");

    // Two rounds, one matching device each
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|usn| usn.contains("RINCON")));
}

#[tokio::test(start_paused = true)]
async fn test_mdns_discovery_from_config() {
    let config = load_fixture_config();
    let mdns = MdnsConfig::from_settings(&config.mdns).expect("valid mDNS settings");
    assert_eq!(mdns.service_type(), "_http._tcp.local.");

    let resolver = MdnsResolver::new(mdns)
        .with_browser(StaticAnnouncements(vec!["Living Room", "Garage"]));

    let started = tokio::time::Instant::now();
    let found = Discover::from_settings(resolver, &config.discovery)
        .collect(&CancellationToken::new())
        .await
        .expect("discovery succeeds");

    let names: Vec<&str> = found.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["Living Room", "Garage"]);
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

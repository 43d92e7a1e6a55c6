//! Common test utilities and helpers for integration tests

use async_trait::async_trait;
use netscout_core::AppConfig;
use netscout_discovery::{
    Browse, MdnsConfig, Result, Search, ServiceEntry, SsdpConfig, SsdpService,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Get the path to test fixtures
pub fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("tests").join("fixtures")
}

/// Load the fixture configuration
pub fn load_fixture_config() -> AppConfig {
    let path = fixtures_dir().join("netscout.yaml");
    AppConfig::from_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture config {:?}: {}", path, e))
}

/// An SSDP response as a device would send it
pub fn ssdp_device(usn: &str, server: &str) -> SsdpService {
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=1800\r\n\
         LOCATION: http://192.168.1.30:1400/xml/device_description.xml\r\n\
         SERVER: {}\r\n\
         ST: upnp:rootdevice\r\n\
         USN: {}\r\n\
         \r\n",
        server, usn
    );
    SsdpService::parse(response.as_bytes(), Some("192.168.1.30:1900".parse().unwrap()))
        .expect("valid SSDP response")
}

/// Answers every search round with the same responses
pub struct StaticDevices(pub Vec<SsdpService>);

#[async_trait]
impl Search for StaticDevices {
    async fn search(
        &self,
        _config: &SsdpConfig,
        _cancel: &CancellationToken,
    ) -> Result<Vec<SsdpService>> {
        Ok(self.0.clone())
    }
}

/// Announces the given instance names once, then waits to be cancelled
pub struct StaticAnnouncements(pub Vec<&'static str>);

#[async_trait]
impl Browse for StaticAnnouncements {
    async fn browse(
        &self,
        config: &MdnsConfig,
        cancel: CancellationToken,
        entries: mpsc::Sender<ServiceEntry>,
    ) -> Result<()> {
        for name in &self.0 {
            let entry = ServiceEntry::new(*name, config.service_type());
            if entries.send(entry).await.is_err() {
                return Ok(());
            }
        }
        cancel.cancelled().await;
        Ok(())
    }
}

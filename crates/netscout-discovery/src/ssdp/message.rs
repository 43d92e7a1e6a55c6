//! SSDP wire format: M-SEARCH requests and search responses

use super::PROTOCOL;
use crate::error::{DiscoveryError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// SSDP multicast group
pub const MULTICAST_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

/// Largest MX value devices are required to honour
pub const MAX_MX: u64 = 5;

/// Builds an `M-SEARCH` request for `search_target`.
///
/// `wait_secs` becomes the MX header, capped at [`MAX_MX`].
pub fn search_request(search_target: &str, wait_secs: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        MULTICAST_ADDR,
        wait_secs.clamp(1, MAX_MX),
        search_target
    )
}

/// One device or service answering a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SsdpService {
    /// Search target the device answered for (ST)
    pub search_target: String,

    /// Unique service name (USN)
    pub usn: String,

    /// URL of the device description (LOCATION)
    pub location: String,

    /// Server banner (SERVER), empty if absent
    pub server: String,

    /// Advertisement lifetime in seconds from CACHE-CONTROL
    pub max_age: Option<u32>,

    /// Address the response came from
    pub from: Option<SocketAddr>,

    /// Every response header, keys lowercased
    pub headers: BTreeMap<String, String>,
}

impl SsdpService {
    /// Parses a search response datagram.
    pub fn parse(datagram: &[u8], from: Option<SocketAddr>) -> Result<Self> {
        let text = std::str::from_utf8(datagram)
            .map_err(|_| DiscoveryError::protocol(PROTOCOL, "response is not valid UTF-8"))?;

        let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));

        let status = lines
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| DiscoveryError::protocol(PROTOCOL, "empty response"))?;
        check_status(status)?;

        let mut headers = BTreeMap::new();
        for line in lines {
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(DiscoveryError::protocol(
                    PROTOCOL,
                    format!("malformed header line '{}'", line),
                ));
            };
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let required = |key: &str| {
            headers
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    DiscoveryError::protocol(
                        PROTOCOL,
                        format!("response is missing the {} header", key.to_ascii_uppercase()),
                    )
                })
        };

        let usn = required("usn")?;
        let location = required("location")?;

        Ok(Self {
            search_target: headers.get("st").cloned().unwrap_or_default(),
            usn,
            location,
            server: headers.get("server").cloned().unwrap_or_default(),
            max_age: headers.get("cache-control").and_then(|v| parse_max_age(v)),
            from,
            headers,
        })
    }

    /// Gets a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

impl fmt::Display for SsdpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.usn, self.location)?;
        if !self.server.is_empty() {
            write!(f, " ({})", self.server)?;
        }
        Ok(())
    }
}

fn check_status(line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();

    if !version.starts_with("HTTP/") {
        return Err(DiscoveryError::protocol(
            PROTOCOL,
            format!("unexpected status line '{}'", line),
        ));
    }
    if code != "200" {
        return Err(DiscoveryError::protocol(
            PROTOCOL,
            format!("unexpected status {}", code),
        ));
    }
    Ok(())
}

/// Extracts `max-age` from a CACHE-CONTROL value.
fn parse_max_age(value: &str) -> Option<u32> {
    value.split(',').find_map(|directive| {
        let (key, age) = directive.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("max-age") {
            age.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

//! Shared types for device discovery.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::protocol_constants::SONOS_PORT;
use crate::sonos::types::HostEndpoint;

/// Which SSDP variant found a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryMethod {
    /// SSDP multicast to 239.255.255.250:1900
    SsdpMulticast,
    /// SSDP broadcast (directed per-interface + limited 255.255.255.255)
    SsdpBroadcast,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SsdpMulticast => write!(f, "SSDP multicast"),
            Self::SsdpBroadcast => write!(f, "SSDP broadcast"),
        }
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to bind UDP socket for discovery.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// No M-SEARCH could be sent on any interface.
    #[error("failed to send SSDP search: {0}")]
    SendSearch(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,

    /// Both methods were disabled in configuration.
    #[error("no discovery method enabled")]
    NoMethodsEnabled,

    /// Every enabled discovery method failed to start.
    #[error("all discovery methods failed: {}", format_failures(.0))]
    AllMethodsFailed(Vec<(DiscoveryMethod, String)>),

    /// Discovery was cancelled by session teardown.
    #[error("discovery cancelled")]
    Cancelled,
}

fn format_failures(failures: &[(DiscoveryMethod, String)]) -> String {
    failures
        .iter()
        .map(|(method, reason)| format!("{}: {}", method, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// One discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Canonical UUID (normalized RINCON_xxx).
    pub uuid: String,
    /// Source IP of the SSDP response.
    pub ip: String,
    /// Device description URL.
    pub location: String,
    /// Which discovery methods found this device.
    pub methods: BTreeSet<DiscoveryMethod>,
}

impl DeviceRecord {
    /// Creates a record from one SSDP response.
    ///
    /// When the response carried no LOCATION header, the standard device
    /// description URL on port 1400 is assumed.
    pub fn new(uuid: String, ip: String, location: Option<String>, method: DiscoveryMethod) -> Self {
        let location = location.unwrap_or_else(|| {
            format!("http://{}:{}/xml/device_description.xml", ip, SONOS_PORT)
        });
        Self {
            uuid,
            ip,
            location,
            methods: BTreeSet::from([method]),
        }
    }

    /// The device's control server.
    #[must_use]
    pub fn endpoint(&self) -> HostEndpoint {
        HostEndpoint::from_location(&self.location).unwrap_or_else(|| HostEndpoint::from_ip(&self.ip))
    }

    /// Merges a second sighting of the same device.
    ///
    /// The first record's location wins; methods are unioned.
    pub fn merge(&mut self, other: DeviceRecord) {
        self.methods.extend(other.methods);
    }
}

/// Normalizes a Sonos UUID to canonical form for deduplication.
///
/// Handles the shapes seen in SSDP and topology documents:
/// - `uuid:` prefix (from UPnP UDN)
/// - `::urn:schemas-upnp-org:device:ZonePlayer:1` suffix (from USN)
/// - `:<digits>` suffixes (group IDs like `RINCON_...01400:58`)
/// - `_MS`, `_MR`, `_LR` suffixes (root device + subdevices)
pub fn normalize_uuid(raw: &str) -> String {
    let mut uuid = raw.trim();

    if let Some(stripped) = uuid.strip_prefix("uuid:") {
        uuid = stripped;
    }

    if let Some(idx) = uuid.find("::") {
        uuid = &uuid[..idx];
    }

    // Only RINCON ids, so IPv6-like strings are left alone
    if uuid.contains("RINCON_") {
        if let Some((head, suffix)) = uuid.rsplit_once(':') {
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                uuid = head;
            }
        }
    }

    const SUFFIXES: &[&str] = &["_MS", "_MR", "_LR"];
    while let Some(stripped) = SUFFIXES.iter().find_map(|s| uuid.strip_suffix(*s)) {
        uuid = stripped;
    }

    uuid.to_string()
}

/// Virtual interface prefixes to filter out during discovery.
pub const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap", "utun", "awdl",
];

/// Checks if an interface name belongs to a virtual/container interface.
pub fn is_virtual_interface(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(prefix))
}

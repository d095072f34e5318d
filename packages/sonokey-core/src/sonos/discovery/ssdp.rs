//! SSDP M-SEARCH for Sonos ZonePlayers.
//!
//! Two methods share one engine:
//!
//! - **Multicast**: M-SEARCH to 239.255.255.250:1900
//! - **Broadcast**: directed broadcast per interface plus 255.255.255.255
//!
//! Devices reply unicast to the sending socket, so each interface gets one
//! socket that is used for both send and receive.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use super::types::{
    is_virtual_interface, normalize_uuid, DeviceRecord, DiscoveryError, DiscoveryMethod,
    DiscoveryResult,
};
use crate::protocol_constants::{
    SONOS_SEARCH_TARGET, SSDP_LIMITED_BROADCAST_ADDR, SSDP_MULTICAST_ADDR,
};

/// Timing of one SSDP search round.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Number of M-SEARCH packets to send per target.
    pub send_count: u32,
    /// Delay between M-SEARCH sends.
    pub retry_delay: Duration,
    /// Collection window, measured from the first send.
    pub discovery_timeout: Duration,
    /// MX value (max response delay in seconds).
    pub mx_value: u64,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            send_count: 3,
            retry_delay: Duration::from_millis(800),
            discovery_timeout: Duration::from_secs(5),
            mx_value: 1,
        }
    }
}

fn build_msearch_message(mx: u64) -> String {
    // HOST is always the multicast group, even for broadcast sends
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        SSDP_MULTICAST_ADDR, mx, SONOS_SEARCH_TARGET
    )
}

/// A usable IPv4 interface.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip: Ipv4Addr,
    /// Directed broadcast address, assuming a /24.
    pub broadcast: Ipv4Addr,
}

/// Lists non-loopback, non-virtual IPv4 interfaces.
pub fn get_interfaces() -> Vec<InterfaceInfo> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[SSDP] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| {
            if is_virtual_interface(&name) {
                log::debug!("[SSDP] Skipping virtual interface: {}", name);
                return None;
            }
            match addr {
                IpAddr::V4(ip) if !ip.is_loopback() => {
                    let [a, b, c, _] = ip.octets();
                    Some(InterfaceInfo {
                        name,
                        ip,
                        broadcast: Ipv4Addr::new(a, b, c, 255),
                    })
                }
                _ => None,
            }
        })
        .collect()
}

fn create_socket(iface_ip: Ipv4Addr, enable_broadcast: bool) -> DiscoveryResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR on {}: {}", iface_ip, e);
    }

    // UPnP 1.0 recommends a TTL of 4 for SSDP multicast
    if let Err(e) = socket.set_multicast_ttl_v4(4) {
        log::warn!("[SSDP] Failed to set multicast TTL on {}: {}", iface_ip, e);
    }

    if enable_broadcast {
        if let Err(e) = socket.set_broadcast(true) {
            log::warn!("[SSDP] Failed to set SO_BROADCAST on {}: {}", iface_ip, e);
        }
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    socket
        .bind(&SocketAddr::new(IpAddr::V4(iface_ip), 0).into())
        .map_err(DiscoveryError::SocketBind)?;

    UdpSocket::from_std(socket.into()).map_err(DiscoveryError::SocketBind)
}

/// Finds a header value by case-insensitive name.
fn header_value<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

/// Parses one SSDP response into a device record.
///
/// Returns `None` unless the USN carries a `RINCON_` id.
fn parse_ssdp_response(response: &str, src_ip: &str, method: DiscoveryMethod) -> Option<DeviceRecord> {
    let usn = header_value(response, "usn")?;
    let lower = usn.to_ascii_lowercase();
    let raw_uuid = match lower.find("uuid:") {
        Some(idx) => &usn[idx + 5..],
        None => usn,
    };
    let uuid = normalize_uuid(raw_uuid);

    // Sonos ids are always uppercase
    if !uuid.starts_with("RINCON_") {
        return None;
    }

    let location = header_value(response, "location")
        .filter(|l| !l.is_empty())
        .map(str::to_string);

    Some(DeviceRecord::new(uuid, src_ip.to_string(), location, method))
}

fn target_addrs(iface: &InterfaceInfo, method: DiscoveryMethod) -> Vec<String> {
    match method {
        DiscoveryMethod::SsdpMulticast => vec![SSDP_MULTICAST_ADDR.to_string()],
        DiscoveryMethod::SsdpBroadcast => vec![
            format!("{}:1900", iface.broadcast),
            SSDP_LIMITED_BROADCAST_ADDR.to_string(),
        ],
    }
}

/// Runs one SSDP search round with the given method.
///
/// Completes when the collection window closes. Fails only when the search
/// could not be started: no interface, no socket, or no packet sent.
pub async fn discover_ssdp(
    config: &SsdpConfig,
    method: DiscoveryMethod,
    cancel: &CancellationToken,
) -> DiscoveryResult<Vec<DeviceRecord>> {
    let interfaces = get_interfaces();
    if interfaces.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let use_broadcast = method == DiscoveryMethod::SsdpBroadcast;
    let mut sockets = Vec::new();
    let mut last_bind_error = None;
    for iface in interfaces {
        match create_socket(iface.ip, use_broadcast) {
            Ok(socket) => sockets.push((iface, Arc::new(socket))),
            Err(e) => {
                log::warn!(
                    "[SSDP] Failed to create socket for {} ({}): {}",
                    iface.name,
                    iface.ip,
                    e
                );
                last_bind_error = Some(e);
            }
        }
    }

    if sockets.is_empty() {
        return Err(last_bind_error.unwrap_or(DiscoveryError::NoInterfaces));
    }

    log::debug!(
        "[SSDP] [{}] Searching on {} interface(s) ({} sends, {}ms apart)",
        method,
        sockets.len(),
        config.send_count,
        config.retry_delay.as_millis()
    );

    let msg = build_msearch_message(config.mx_value);
    let found: Arc<Mutex<BTreeMap<String, DeviceRecord>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let deadline = Instant::now() + config.discovery_timeout;

    let send_futures = sockets.iter().map(|(iface, socket)| {
        let socket = Arc::clone(socket);
        let targets = target_addrs(iface, method);
        let msg = msg.as_bytes();
        let name = iface.name.as_str();

        async move {
            let mut sent = false;
            let mut last_error = None;
            for attempt in 0..config.send_count {
                if attempt > 0 {
                    tokio::time::sleep(config.retry_delay).await;
                }
                for target in &targets {
                    match socket.send_to(msg, target.as_str()).await {
                        Ok(_) => {
                            sent = true;
                            log::trace!("[SSDP] [{}] Sent M-SEARCH on {} to {}", method, name, target);
                        }
                        Err(e) => {
                            log::warn!(
                                "[SSDP] [{}] Send on {} to {} failed (attempt {}): {}",
                                method,
                                name,
                                target,
                                attempt + 1,
                                e
                            );
                            last_error = Some(e);
                        }
                    }
                }
            }
            if sent {
                None
            } else {
                last_error
            }
        }
    });

    let recv_futures = sockets.iter().map(|(iface, socket)| {
        let socket = Arc::clone(socket);
        let found = Arc::clone(&found);
        let name = iface.name.as_str();

        async move {
            let mut buf = [0u8; 2048];
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match timeout(remaining, socket.recv_from(&mut buf)).await {
                    Ok(Ok((amt, src))) => {
                        let response = String::from_utf8_lossy(&buf[..amt]);
                        let Some(record) =
                            parse_ssdp_response(&response, &src.ip().to_string(), method)
                        else {
                            continue;
                        };
                        log::debug!(
                            "[SSDP] [{}] Found {} at {} via {}",
                            method,
                            record.uuid,
                            record.ip,
                            name
                        );
                        let mut found = found.lock().await;
                        match found.get_mut(&record.uuid) {
                            Some(existing) => existing.merge(record),
                            None => {
                                found.insert(record.uuid.clone(), record);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        log::warn!("[SSDP] [{}] Receive error on {}: {}", method, name, e);
                    }
                    Err(_) => break,
                }
            }
        }
    });

    let round = async {
        tokio::join!(
            futures::future::join_all(send_futures),
            futures::future::join_all(recv_futures)
        )
    };

    let (send_results, _) = tokio::select! {
        _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
        results = round => results,
    };

    // Every interface failed every send
    if send_results.iter().all(Option::is_some) {
        if let Some(e) = send_results.into_iter().flatten().next() {
            return Err(DiscoveryError::SendSearch(e));
        }
    }

    let found = std::mem::take(&mut *found.lock().await);
    log::debug!("[SSDP] [{}] {} unique device(s) found", method, found.len());

    Ok(found.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONOS_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
CACHE-CONTROL: max-age=1800\r\n\
LOCATION: http://192.168.1.10:1400/xml/device_description.xml\r\n\
SERVER: Linux UPnP/1.0 Sonos/63.2-88230\r\n\
USN: uuid:RINCON_ABC12345678901400::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
X-RINCON-HOUSEHOLD: Sonos_abc123\r\n\r\n";

    #[test]
    fn msearch_targets_zone_players() {
        let msg = build_msearch_message(1);
        assert!(msg.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(msg.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(msg.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(msg.contains("MX: 1\r\n"));
        assert!(msg.contains("ST: urn:schemas-upnp-org:device:ZonePlayer:1\r\n"));
        assert!(msg.ends_with("\r\n\r\n"));
    }

    #[test]
    fn parses_sonos_response() {
        let record =
            parse_ssdp_response(SONOS_RESPONSE, "192.168.1.10", DiscoveryMethod::SsdpMulticast)
                .expect("sonos response");
        assert_eq!(record.uuid, "RINCON_ABC12345678901400");
        assert_eq!(record.ip, "192.168.1.10");
        assert_eq!(
            record.location,
            "http://192.168.1.10:1400/xml/device_description.xml"
        );
        assert_eq!(record.endpoint().as_str(), "http://192.168.1.10:1400");
    }

    #[test]
    fn rejects_non_sonos_response() {
        let response = "HTTP/1.1 200 OK\r\n\
LOCATION: http://192.168.1.20:80/description.xml\r\n\
USN: uuid:2f402f80-da50-11e1-9b23-001788255acc::upnp:rootdevice\r\n\r\n";
        assert!(
            parse_ssdp_response(response, "192.168.1.20", DiscoveryMethod::SsdpMulticast).is_none()
        );
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let response = "HTTP/1.1 200 OK\r\n\
location: http://192.168.1.11:1400/xml/device_description.xml\r\n\
usn: UUID:RINCON_DEF01400_MR::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\r\n";
        let record = parse_ssdp_response(response, "192.168.1.11", DiscoveryMethod::SsdpBroadcast)
            .expect("sonos response");
        assert_eq!(record.uuid, "RINCON_DEF01400");
    }

    #[test]
    fn missing_location_falls_back_to_default_url() {
        let response = "HTTP/1.1 200 OK\r\nUSN: uuid:RINCON_XYZ01400\r\n\r\n";
        let record = parse_ssdp_response(response, "10.0.0.7", DiscoveryMethod::SsdpBroadcast)
            .expect("sonos response");
        assert_eq!(record.location, "http://10.0.0.7:1400/xml/device_description.xml");
    }

    #[test]
    fn broadcast_targets_directed_then_limited() {
        let iface = InterfaceInfo {
            name: "eth0".into(),
            ip: Ipv4Addr::new(192, 168, 1, 50),
            broadcast: Ipv4Addr::new(192, 168, 1, 255),
        };
        assert_eq!(
            target_addrs(&iface, DiscoveryMethod::SsdpBroadcast),
            vec!["192.168.1.255:1900".to_string(), "255.255.255.255:1900".to_string()]
        );
        assert_eq!(
            target_addrs(&iface, DiscoveryMethod::SsdpMulticast),
            vec!["239.255.255.250:1900".to_string()]
        );
    }
}

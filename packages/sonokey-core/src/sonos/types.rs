//! Domain types for Sonos endpoints, zone groups and transport state.

use serde::Serialize;

use super::utils::host_endpoint_from_location;
use crate::protocol_constants::SONOS_PORT;

// ─────────────────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Base URL of a device's HTTP control server, e.g. `http://192.168.1.10:1400`.
///
/// Never carries a trailing slash, so control and event paths can be appended
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HostEndpoint(String);

impl HostEndpoint {
    /// Derives the host endpoint (`scheme://host[:port]`) from a UPnP Location URL.
    #[must_use]
    pub fn from_location(location: &str) -> Option<Self> {
        host_endpoint_from_location(location).map(Self)
    }

    /// Builds the default endpoint for a device known only by IP address.
    #[must_use]
    pub fn from_ip(ip: &str) -> Self {
        Self(format!("http://{}:{}", ip, SONOS_PORT))
    }

    /// Returns the endpoint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the full URL for a control or event path on this device.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl std::fmt::Display for HostEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host endpoint of the resolved group coordinator.
///
/// Only the topology resolver creates one, so every API that takes a
/// `CoordinatorEndpoint` is unreachable until resolution has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CoordinatorEndpoint(HostEndpoint);

impl CoordinatorEndpoint {
    pub(crate) fn new(host: HostEndpoint) -> Self {
        Self(host)
    }

    /// The coordinator's host endpoint.
    #[must_use]
    pub fn host(&self) -> &HostEndpoint {
        &self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CoordinatorEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Topology
// ─────────────────────────────────────────────────────────────────────────────

/// One speaker within a zone group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroupMember {
    /// Unique identifier (RINCON_xxx format).
    pub uuid: String,
    /// User-configured room name.
    pub zone_name: String,
    /// Control server of this member.
    pub host: HostEndpoint,
}

/// A zone group from one topology snapshot.
///
/// Groups are rebuilt on every topology fetch; the only identity that
/// survives across fetches is the computed `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGroup {
    /// Group ID as reported by the device (opaque).
    pub id: String,
    /// Display name, see [`group_display_name`].
    pub name: String,
    /// UUID of the coordinator. Always one of `members`.
    pub coordinator_uuid: String,
    /// Members in document order.
    pub members: Vec<ZoneGroupMember>,
}

impl ZoneGroup {
    /// Returns the coordinator member.
    #[must_use]
    pub fn coordinator(&self) -> Option<&ZoneGroupMember> {
        self.members
            .iter()
            .find(|m| m.uuid == self.coordinator_uuid)
    }
}

/// Computes a group's display name.
///
/// A single-member group is named after that member; larger groups are named
/// `"<coordinator> + <N-1>"`.
#[must_use]
pub fn group_display_name(coordinator_name: &str, member_count: usize) -> String {
    if member_count <= 1 {
        coordinator_name.to_string()
    } else {
        format!("{} + {}", coordinator_name, member_count - 1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Transport state as reported by the device in AVTransport events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Playing,
    PausedPlayback,
    Stopped,
    Transitioning,
    NoMediaPresent,
}

impl std::str::FromStr for TransportState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::PausedPlayback),
            "STOPPED" => Ok(Self::Stopped),
            "TRANSITIONING" => Ok(Self::Transitioning),
            "NO_MEDIA_PRESENT" => Ok(Self::NoMediaPresent),
            _ => Err(()),
        }
    }
}

impl TransportState {
    /// Maps a device transport state to the session's playback status.
    ///
    /// Returns `None` for states that are not yet actionable (transitioning,
    /// no media); these leave the session's transport flag unchanged.
    #[must_use]
    pub fn playback_status(self) -> Option<PlaybackStatus> {
        match self {
            Self::Playing => Some(PlaybackStatus::Playing),
            Self::PausedPlayback | Self::Stopped => Some(PlaybackStatus::Paused),
            Self::Transitioning | Self::NoMediaPresent => None,
        }
    }
}

/// Transport status tracked by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

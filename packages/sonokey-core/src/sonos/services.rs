//! The three UPnP services a session talks to.

use serde::Serialize;

/// A UPnP service on a Sonos device.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SonosService {
    /// Transport: play, pause, track skip.
    AVTransport,
    /// Group volume; answered by the coordinator only.
    GroupRenderingControl,
    /// Household topology, queried from any device.
    ZoneGroupTopology,
}

impl SonosService {
    /// Services the session subscribes to on the coordinator.
    pub const EVENTED: [SonosService; 2] = [Self::AVTransport, Self::GroupRenderingControl];

    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::GroupRenderingControl => "urn:schemas-upnp-org:service:GroupRenderingControl:1",
            Self::ZoneGroupTopology => "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
        }
    }

    /// SOAP control path.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Control",
            Self::GroupRenderingControl => "/MediaRenderer/GroupRenderingControl/Control",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Control",
        }
    }

    /// GENA subscription path, for the services listed in [`Self::EVENTED`].
    #[must_use]
    pub fn event_path(&self) -> Option<&'static str> {
        match self {
            Self::AVTransport => Some("/MediaRenderer/AVTransport/Event"),
            Self::GroupRenderingControl => Some("/MediaRenderer/GroupRenderingControl/Event"),
            Self::ZoneGroupTopology => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::GroupRenderingControl => "GroupRenderingControl",
            Self::ZoneGroupTopology => "ZoneGroupTopology",
        }
    }
}

impl std::fmt::Display for SonosService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

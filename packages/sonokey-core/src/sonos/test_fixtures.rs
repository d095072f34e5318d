//! Shared XML fixtures for tests.

/// Builds a ZoneGroupMember element.
pub fn member_xml(uuid: &str, ip: &str, zone_name: &str) -> String {
    format!(
        r#"<ZoneGroupMember UUID="{uuid}" Location="http://{ip}:1400/xml/device_description.xml" ZoneName="{zone_name}" Icon="x-rincon-roomicon:living" SoftwareVersion="79.1-56030"/>"#
    )
}

/// Wraps members into a ZoneGroup element.
pub fn group_xml(id: &str, coordinator_uuid: &str, members: &[String]) -> String {
    format!(
        r#"<ZoneGroup Coordinator="{coordinator_uuid}" ID="{id}">{}</ZoneGroup>"#,
        members.join("")
    )
}

/// Wraps groups into a ZoneGroups root element.
pub fn zone_groups_xml(groups: &[String]) -> String {
    format!("<ZoneGroups>{}</ZoneGroups>", groups.join(""))
}

/// A three-room household: "Bedroom" alone, "Kitchen + 1" grouped.
pub fn household_xml() -> String {
    zone_groups_xml(&[
        group_xml(
            "RINCON_KITCHEN01400:12",
            "RINCON_KITCHEN01400",
            &[
                member_xml("RINCON_KITCHEN01400", "192.168.1.30", "Kitchen"),
                member_xml("RINCON_DINING01400", "192.168.1.31", "Dining Room"),
            ],
        ),
        group_xml(
            "RINCON_BEDROOM01400:3",
            "RINCON_BEDROOM01400",
            &[member_xml("RINCON_BEDROOM01400", "10.0.0.5", "Bedroom")],
        ),
    ])
}

/// Wraps a ZoneGroupState document into a GetZoneGroupState SOAP response.
pub fn zone_group_state_response(zone_groups: &str) -> String {
    let escaped = zone_groups
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:GetZoneGroupStateResponse xmlns:u="urn:schemas-upnp-org:service:ZoneGroupTopology:1"><ZoneGroupState>{escaped}</ZoneGroupState></u:GetZoneGroupStateResponse></s:Body></s:Envelope>"#
    )
}

/// SetRelativeGroupVolume response reporting volume 32.
pub const SET_RELATIVE_GROUP_VOLUME_RESPONSE: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:SetRelativeGroupVolumeResponse xmlns:u="urn:schemas-upnp-org:service:GroupRenderingControl:1"><NewVolume>32</NewVolume></u:SetRelativeGroupVolumeResponse></s:Body></s:Envelope>"#;

/// SetRelativeGroupVolume response with a non-numeric volume.
pub const SET_RELATIVE_GROUP_VOLUME_MALFORMED: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:SetRelativeGroupVolumeResponse xmlns:u="urn:schemas-upnp-org:service:GroupRenderingControl:1"><NewVolume>loud</NewVolume></u:SetRelativeGroupVolumeResponse></s:Body></s:Envelope>"#;

/// AVTransport NOTIFY body carrying `state` in LastChange.
pub fn av_transport_notify(state: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/AVT/&quot;&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;TransportState val=&quot;{state}&quot;/&gt;&lt;CurrentPlayMode val=&quot;NORMAL&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#
    )
}

/// AVTransport NOTIFY body as a playing speaker sends it: the LastChange
/// document carries escaped DIDL track metadata ahead of `TransportState`.
pub fn av_transport_notify_with_metadata(state: &str) -> String {
    let didl = concat!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
        r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" "#,
        r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
        r#"<item id="-1" parentID="-1" restricted="true">"#,
        r#"<res protocolInfo="sonos.com-http:*:audio/mp4:*" duration="0:03:41"></res>"#,
        r#"<dc:title>Song &amp; Dance</dc:title><dc:creator>The Band</dc:creator>"#,
        r#"<upnp:class>object.item.audioItem.musicTrack</upnp:class>"#,
        r#"</item></DIDL-Lite>"#,
    );
    let event = format!(
        r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0"><CurrentTrackURI val="x-sonos-http:track.mp4?sid=9"/><CurrentTrackMetaData val="{}"/><TransportState val="{state}"/><CurrentPlayMode val="NORMAL"/></InstanceID></Event>"#,
        html_escape::encode_double_quoted_attribute(didl)
    );
    format!(
        r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>{}</LastChange>
  </e:property>
</e:propertyset>"#,
        html_escape::encode_text(&event)
    )
}

/// GroupRenderingControl NOTIFY body with volume 27.
pub const GROUP_RENDERING_CONTROL_NOTIFY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><GroupMute>0</GroupMute></e:property>
  <e:property><GroupVolume>27</GroupVolume></e:property>
  <e:property><GroupVolumeChangeable>1</GroupVolumeChangeable></e:property>
</e:propertyset>"#;

/// GroupRenderingControl NOTIFY body without a volume.
pub const GROUP_RENDERING_CONTROL_NOTIFY_MUTE_ONLY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><GroupMute>1</GroupMute></e:property>
</e:propertyset>"#;

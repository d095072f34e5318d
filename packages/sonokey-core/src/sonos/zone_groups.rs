//! Zone group topology parsing and retrieval.
//!
//! Parses ZoneGroupState XML into `ZoneGroup` records. Parsing is strict: a
//! malformed member or a coordinator outside its own group fails the whole
//! snapshot, since a partial topology could select the wrong coordinator.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use thiserror::Error;

use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapRequestBuilder};
use crate::sonos::types::{group_display_name, HostEndpoint, ZoneGroup, ZoneGroupMember};
use crate::sonos::utils::{extract_xml_text, get_xml_attr};

/// Errors from fetching or interpreting the zone group topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Resolution was attempted with an empty discovery result.
    #[error("no devices to query for topology")]
    NoDevices,

    /// The GetZoneGroupState request failed.
    #[error("topology request failed: {0}")]
    Soap(#[from] SoapError),

    /// The response carried no ZoneGroupState element.
    #[error("response has no ZoneGroupState")]
    MissingZoneGroupState,

    /// The ZoneGroupState document is not well-formed.
    #[error("malformed topology XML: {0}")]
    Xml(String),

    /// A required attribute is missing.
    #[error("{element} is missing the {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    /// A member has no usable Location.
    #[error("member {uuid} has no host endpoint")]
    MissingHost { uuid: String },

    /// A group's declared coordinator is not one of its members.
    #[error("coordinator {coordinator} of group {group_id} is not a member of that group")]
    CoordinatorNotMember {
        group_id: String,
        coordinator: String,
    },
}

/// Convenient Result alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

struct GroupBuilder {
    id: String,
    coordinator_uuid: String,
    members: Vec<ZoneGroupMember>,
}

impl GroupBuilder {
    fn start(e: &BytesStart) -> TopologyResult<Self> {
        let coordinator_uuid =
            get_xml_attr(e, b"Coordinator").ok_or(TopologyError::MissingAttribute {
                element: "ZoneGroup",
                attribute: "Coordinator",
            })?;
        Ok(Self {
            id: get_xml_attr(e, b"ID").unwrap_or_default(),
            coordinator_uuid,
            members: Vec::new(),
        })
    }

    fn finish(self) -> TopologyResult<ZoneGroup> {
        let coordinator = self
            .members
            .iter()
            .find(|m| m.uuid == self.coordinator_uuid)
            .ok_or_else(|| TopologyError::CoordinatorNotMember {
                group_id: self.id.clone(),
                coordinator: self.coordinator_uuid.clone(),
            })?;

        Ok(ZoneGroup {
            name: group_display_name(&coordinator.zone_name, self.members.len()),
            id: self.id,
            coordinator_uuid: self.coordinator_uuid,
            members: self.members,
        })
    }
}

fn parse_member(e: &BytesStart) -> TopologyResult<ZoneGroupMember> {
    let uuid = get_xml_attr(e, b"UUID").ok_or(TopologyError::MissingAttribute {
        element: "ZoneGroupMember",
        attribute: "UUID",
    })?;
    let zone_name = get_xml_attr(e, b"ZoneName").ok_or(TopologyError::MissingAttribute {
        element: "ZoneGroupMember",
        attribute: "ZoneName",
    })?;
    let host = get_xml_attr(e, b"Location")
        .and_then(|location| HostEndpoint::from_location(&location))
        .ok_or_else(|| TopologyError::MissingHost { uuid: uuid.clone() })?;

    Ok(ZoneGroupMember {
        uuid,
        zone_name,
        host,
    })
}

/// Parses ZoneGroupState XML (already unescaped) into zone groups.
///
/// Groups are returned in document order. Only `ZoneGroupMember` elements
/// count as members; nested `Satellite` elements belong to their member.
pub fn parse_zone_group_xml(xml: &str) -> TopologyResult<Vec<ZoneGroup>> {
    let mut groups = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut current: Option<GroupBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"ZoneGroup" && current.is_some() =>
            {
                let outer = current.as_ref().map(|g| g.id.clone()).unwrap_or_default();
                return Err(TopologyError::Xml(format!(
                    "ZoneGroup nested inside group {}",
                    outer
                )));
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"ZoneGroup" => {
                groups.push(GroupBuilder::start(e)?.finish()?);
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"ZoneGroup" => current = Some(GroupBuilder::start(e)?),
                b"ZoneGroupMember" => {
                    let member = parse_member(e)?;
                    match current.as_mut() {
                        Some(group) => group.members.push(member),
                        None => {
                            return Err(TopologyError::Xml(format!(
                                "member {} outside of a ZoneGroup",
                                member.uuid
                            )))
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"ZoneGroup" => {
                if let Some(group) = current.take() {
                    groups.push(group.finish()?);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TopologyError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    log::debug!("[Topology] Parsed {} zone group(s)", groups.len());
    Ok(groups)
}

/// Fetches and parses the zone group topology from any device.
pub async fn get_zone_groups(client: &Client, host: &HostEndpoint) -> TopologyResult<Vec<ZoneGroup>> {
    let response = SoapRequestBuilder::new(client, host)
        .service(SonosService::ZoneGroupTopology)
        .action("GetZoneGroupState")
        .send()
        .await?;

    parse_zone_group_state_response(&response)
}

/// Extracts and parses the escaped ZoneGroupState from a SOAP response.
pub fn parse_zone_group_state_response(response: &str) -> TopologyResult<Vec<ZoneGroup>> {
    let xml = extract_xml_text(response, "ZoneGroupState")
        .ok_or(TopologyError::MissingZoneGroupState)?;

    parse_zone_group_xml(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::test_fixtures::{
        group_xml, household_xml, member_xml, zone_group_state_response, zone_groups_xml,
    };

    #[test]
    fn soap_response_is_unescaped_and_parsed() {
        let groups = parse_zone_group_state_response(&zone_group_state_response(&household_xml()))
            .expect("valid response");
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Kitchen + 1", "Bedroom"]);
    }

    #[test]
    fn soap_response_without_state_is_an_error() {
        let err = parse_zone_group_state_response("<s:Envelope><s:Body/></s:Envelope>")
            .expect_err("no ZoneGroupState");
        assert!(matches!(err, TopologyError::MissingZoneGroupState));
    }

    #[test]
    fn single_member_group_is_named_after_member() {
        let xml = zone_groups_xml(&[group_xml(
            "RINCON_K:1",
            "RINCON_K",
            &[member_xml("RINCON_K", "192.168.1.10", "Kitchen")],
        )]);

        let groups = parse_zone_group_xml(&xml).expect("valid topology");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Kitchen");
        assert_eq!(groups[0].members[0].host.as_str(), "http://192.168.1.10:1400");
    }

    #[test]
    fn multi_member_group_counts_other_members() {
        let xml = zone_groups_xml(&[group_xml(
            "RINCON_B:5",
            "RINCON_B",
            &[
                member_xml("RINCON_A", "192.168.1.11", "Bathroom"),
                member_xml("RINCON_B", "192.168.1.12", "Bedroom"),
                member_xml("RINCON_C", "192.168.1.13", "Office"),
            ],
        )]);

        let groups = parse_zone_group_xml(&xml).expect("valid topology");
        assert_eq!(groups[0].name, "Bedroom + 2");
        assert_eq!(
            groups[0].coordinator().map(|m| m.zone_name.as_str()),
            Some("Bedroom")
        );
    }

    #[test]
    fn coordinator_outside_group_is_rejected() {
        let xml = zone_groups_xml(&[
            group_xml(
                "G1",
                "RINCON_B",
                &[member_xml("RINCON_A", "192.168.1.11", "Kitchen")],
            ),
            group_xml(
                "G2",
                "RINCON_B",
                &[member_xml("RINCON_B", "192.168.1.12", "Bedroom")],
            ),
        ]);

        let err = parse_zone_group_xml(&xml).expect_err("coordinator in other group");
        assert!(matches!(
            err,
            TopologyError::CoordinatorNotMember { ref group_id, .. } if group_id == "G1"
        ));
    }

    #[test]
    fn member_without_location_is_rejected() {
        let xml = zone_groups_xml(&[group_xml(
            "G1",
            "RINCON_A",
            &[r#"<ZoneGroupMember UUID="RINCON_A" ZoneName="Kitchen"/>"#.to_string()],
        )]);

        let err = parse_zone_group_xml(&xml).expect_err("missing host");
        assert!(matches!(err, TopologyError::MissingHost { ref uuid } if uuid == "RINCON_A"));
    }

    #[test]
    fn group_without_coordinator_attribute_is_rejected() {
        let xml = zone_groups_xml(&[format!(
            r#"<ZoneGroup ID="G1">{}</ZoneGroup>"#,
            member_xml("RINCON_A", "192.168.1.11", "Kitchen")
        )]);

        let err = parse_zone_group_xml(&xml).expect_err("missing coordinator");
        assert!(matches!(
            err,
            TopologyError::MissingAttribute {
                attribute: "Coordinator",
                ..
            }
        ));
    }

    #[test]
    fn satellites_do_not_count_as_members() {
        let xml = zone_groups_xml(&[group_xml(
            "G1",
            "RINCON_TV",
            &[r#"<ZoneGroupMember UUID="RINCON_TV" Location="http://192.168.1.20:1400/xml/device_description.xml" ZoneName="Living Room"><Satellite UUID="RINCON_SUB" Location="http://192.168.1.21:1400/xml/device_description.xml" ZoneName="Living Room"/></ZoneGroupMember>"#.to_string()],
        )]);

        let groups = parse_zone_group_xml(&xml).expect("valid topology");
        assert_eq!(groups[0].members.len(), 1);
        assert_eq!(groups[0].name, "Living Room");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = parse_zone_group_xml("<ZoneGroups><ZoneGroup Coordinator=\"A\"></ZoneGroups>")
            .expect_err("mismatched tags");
        assert!(matches!(err, TopologyError::Xml(_)));
    }

    #[test]
    fn nested_zone_group_is_rejected() {
        let inner = group_xml(
            "RINCON_BEDROOM01400:3",
            "RINCON_BEDROOM01400",
            &[member_xml("RINCON_BEDROOM01400", "10.0.0.5", "Bedroom")],
        );
        let xml = zone_groups_xml(&[group_xml(
            "RINCON_KITCHEN01400:12",
            "RINCON_KITCHEN01400",
            &[
                member_xml("RINCON_KITCHEN01400", "192.168.1.30", "Kitchen"),
                inner,
            ],
        )]);

        let err = parse_zone_group_xml(&xml).expect_err("nested group");
        assert!(matches!(err, TopologyError::Xml(ref msg) if msg.contains("RINCON_KITCHEN01400:12")));
    }

    #[test]
    fn empty_topology_parses_to_no_groups() {
        let groups = parse_zone_group_xml("<ZoneGroups></ZoneGroups>").expect("valid topology");
        assert!(groups.is_empty());
    }
}

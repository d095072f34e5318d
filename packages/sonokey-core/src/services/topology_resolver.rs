//! Resolution of the configured group name to its coordinator.

use thiserror::Error;

use crate::sonos::discovery::DeviceRecord;
use crate::sonos::traits::SonosTopology;
use crate::sonos::types::{CoordinatorEndpoint, ZoneGroup};
use crate::sonos::zone_groups::TopologyError;

/// The configured group is not in the current topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("group {target:?} not found (available: {})", .available.join(", "))]
pub struct GroupNotFoundError {
    /// The configured name, verbatim.
    pub target: String,
    /// Display names present in the topology, sorted.
    pub available: Vec<String>,
}

/// Failure to resolve a coordinator.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    GroupNotFound(#[from] GroupNotFoundError),
}

/// Convenient Result alias for coordinator resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// The matched group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// Display name, equal to the configured target.
    pub name: String,
    pub coordinator_uuid: String,
    pub coordinator: CoordinatorEndpoint,
}

/// Picks the group whose display name equals `target`.
///
/// Groups are sorted by display name first so the choice between duplicate
/// names is deterministic.
pub fn select_group(mut groups: Vec<ZoneGroup>, target: &str) -> Result<ZoneGroup, GroupNotFoundError> {
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    match groups.iter().position(|g| g.name == target) {
        Some(index) => Ok(groups.swap_remove(index)),
        None => Err(GroupNotFoundError {
            target: target.to_string(),
            available: groups.into_iter().map(|g| g.name).collect(),
        }),
    }
}

/// Resolves `target` to its coordinator endpoint.
///
/// Queries the topology from the first device in `devices`. An empty list
/// fails with `TopologyError::NoDevices` without any network access.
pub async fn resolve_coordinator(
    topology: &dyn SonosTopology,
    devices: &[DeviceRecord],
    target: &str,
) -> ResolveResult<ResolvedGroup> {
    let device = devices.first().ok_or(TopologyError::NoDevices)?;
    let host = device.endpoint();

    log::debug!("[Topology] Fetching zone groups from {} ({})", host, device.uuid);
    let groups = topology.get_zone_groups(&host).await?;
    log::debug!("[Topology] {} group(s) in topology", groups.len());

    let group = select_group(groups, target)?;
    let coordinator = group
        .coordinator()
        .ok_or_else(|| TopologyError::CoordinatorNotMember {
            group_id: group.id.clone(),
            coordinator: group.coordinator_uuid.clone(),
        })?;

    log::info!(
        "[Topology] Group {:?} -> coordinator {} ({})",
        group.name,
        coordinator.host,
        coordinator.zone_name
    );

    Ok(ResolvedGroup {
        coordinator: CoordinatorEndpoint::new(coordinator.host.clone()),
        coordinator_uuid: group.coordinator_uuid.clone(),
        name: group.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::discovery::DiscoveryMethod;
    use crate::sonos::mock::MockSonos;
    use crate::sonos::test_fixtures::{group_xml, member_xml, zone_groups_xml};
    use crate::sonos::types::HostEndpoint;
    use crate::sonos::zone_groups::parse_zone_group_xml;

    fn groups(xml: &str) -> Vec<ZoneGroup> {
        parse_zone_group_xml(xml).expect("valid fixture")
    }

    #[tokio::test]
    async fn resolves_bedroom_to_exact_host() {
        let mock = MockSonos::new();
        mock.set_topology_xml(zone_groups_xml(&[
            group_xml(
                "RINCON_KITCHEN01400:12",
                "RINCON_KITCHEN01400",
                &[member_xml("RINCON_KITCHEN01400", "192.168.1.30", "Kitchen")],
            ),
            r#"<ZoneGroup Coordinator="RINCON_BEDROOM01400" ID="RINCON_BEDROOM01400:3"><ZoneGroupMember UUID="RINCON_BEDROOM01400" Location="http://10.0.0.5/xml/device_description.xml" ZoneName="Bedroom"/></ZoneGroup>"#.to_string(),
        ]));
        let devices = vec![DeviceRecord::new(
            "RINCON_KITCHEN01400".into(),
            "192.168.1.30".into(),
            None,
            DiscoveryMethod::SsdpMulticast,
        )];

        let resolved = resolve_coordinator(&mock, &devices, "Bedroom")
            .await
            .expect("resolved");

        assert_eq!(resolved.coordinator.as_str(), "http://10.0.0.5");
        assert_eq!(resolved.name, "Bedroom");
        assert_eq!(
            mock.topology_queries(),
            vec![HostEndpoint::from_ip("192.168.1.30")]
        );
    }

    #[tokio::test]
    async fn missing_group_names_target() {
        let mock = MockSonos::new();
        mock.set_topology_xml(zone_groups_xml(&[group_xml(
            "RINCON_KITCHEN01400:12",
            "RINCON_KITCHEN01400",
            &[member_xml("RINCON_KITCHEN01400", "192.168.1.30", "Kitchen")],
        )]));
        let devices = vec![DeviceRecord::new(
            "RINCON_KITCHEN01400".into(),
            "192.168.1.30".into(),
            None,
            DiscoveryMethod::SsdpMulticast,
        )];

        match resolve_coordinator(&mock, &devices, "Bedroom").await {
            Err(ResolveError::GroupNotFound(e)) => {
                assert_eq!(e.target, "Bedroom");
                assert_eq!(e.available, vec!["Kitchen".to_string()]);
            }
            other => panic!("expected GroupNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_device_list_fails_without_query() {
        let mock = MockSonos::new();
        let result = resolve_coordinator(&mock, &[], "Bedroom").await;

        assert!(matches!(
            result,
            Err(ResolveError::Topology(TopologyError::NoDevices))
        ));
        assert!(mock.topology_queries().is_empty());
    }

    #[tokio::test]
    async fn malformed_topology_is_topology_error() {
        let mock = MockSonos::new();
        mock.set_topology_xml(zone_groups_xml(&[group_xml(
            "RINCON_A:1",
            "RINCON_ELSEWHERE",
            &[member_xml("RINCON_A", "10.0.0.7", "Office")],
        )]));
        let devices = vec![DeviceRecord::new(
            "RINCON_A".into(),
            "10.0.0.7".into(),
            None,
            DiscoveryMethod::SsdpBroadcast,
        )];

        assert!(matches!(
            resolve_coordinator(&mock, &devices, "Office").await,
            Err(ResolveError::Topology(TopologyError::CoordinatorNotMember { .. }))
        ));
    }

    #[test]
    fn grouped_name_matches_display_label() {
        let group = select_group(
            groups(&crate::sonos::test_fixtures::household_xml()),
            "Kitchen + 1",
        )
        .expect("found");
        assert_eq!(group.coordinator_uuid, "RINCON_KITCHEN01400");
        assert_eq!(group.members.len(), 2);
    }

    #[test]
    fn match_is_exact() {
        let household = groups(&crate::sonos::test_fixtures::household_xml());
        assert!(select_group(household.clone(), "Kitchen").is_err());
        assert!(select_group(household.clone(), "bedroom").is_err());
        assert!(select_group(household, "Bedroom").is_ok());
    }

    #[test]
    fn duplicate_names_pick_first_in_sorted_order() {
        let xml = zone_groups_xml(&[
            group_xml(
                "RINCON_B:1",
                "RINCON_B",
                &[member_xml("RINCON_B", "10.0.0.8", "Office")],
            ),
            group_xml(
                "RINCON_A:1",
                "RINCON_A",
                &[member_xml("RINCON_A", "10.0.0.7", "Office")],
            ),
        ]);
        let first = select_group(groups(&xml), "Office").expect("found");
        let again = select_group(groups(&xml), "Office").expect("found");
        assert_eq!(first, again);
    }

    #[test]
    fn not_found_lists_available_sorted() {
        let err = select_group(
            groups(&crate::sonos::test_fixtures::household_xml()),
            "Garage",
        )
        .expect_err("missing");
        assert_eq!(err.available, vec!["Bedroom", "Kitchen + 1"]);
        assert!(err.to_string().contains("\"Garage\""));
    }
}

//! GENA NOTIFY payload parsing.
//!
//! Pure functions that turn a NOTIFY body into state fragments.

use crate::protocol_constants::MAX_VOLUME;
use crate::sonos::services::SonosService;
use crate::sonos::types::TransportState;
use crate::sonos::utils::{extract_empty_val_attrs, extract_xml_text};
use crate::state::StateFragment;

/// Parses an AVTransport NOTIFY body.
///
/// Reads `TransportState` from the escaped LastChange document. Returns
/// `None` if the event carries no transport state or an unknown value.
#[must_use]
pub fn parse_av_transport(body: &str) -> Option<TransportState> {
    let last_change = extract_xml_text(body, "LastChange")?;

    // Some firmware escapes LastChange twice. A decoded document must not be
    // decoded again: attribute values like CurrentTrackMetaData carry escaped
    // DIDL that would break the markup.
    let document = if last_change.trim_start().starts_with('<') {
        last_change
    } else {
        html_escape::decode_html_entities(&last_change).into_owned()
    };
    let attrs = extract_empty_val_attrs(&document, &["TransportState"]);

    let raw = attrs.get("TransportState")?;
    match raw.parse() {
        Ok(state) => Some(state),
        Err(()) => {
            log::debug!("[GENA] Ignoring unknown transport state {:?}", raw);
            None
        }
    }
}

/// Parses a GroupRenderingControl NOTIFY body.
///
/// GroupRenderingControl uses plain properties, not LastChange.
#[must_use]
pub fn parse_group_rendering_control(body: &str) -> Option<u8> {
    let volume = extract_xml_text(body, "GroupVolume")?;
    let volume: u16 = volume.trim().parse().ok()?;
    Some(volume.min(u16::from(MAX_VOLUME)) as u8)
}

/// Maps a NOTIFY body for `service` to state fragments.
///
/// Transport states that are not actionable yet (transitioning, no media,
/// unknown) produce no fragment.
#[must_use]
pub fn parse_notify(service: SonosService, body: &str) -> Vec<StateFragment> {
    match service {
        SonosService::AVTransport => parse_av_transport(body)
            .and_then(TransportState::playback_status)
            .map(StateFragment::Transport)
            .into_iter()
            .collect(),
        SonosService::GroupRenderingControl => parse_group_rendering_control(body)
            .map(StateFragment::Volume)
            .into_iter()
            .collect(),
        SonosService::ZoneGroupTopology => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::test_fixtures::{
        av_transport_notify, av_transport_notify_with_metadata, GROUP_RENDERING_CONTROL_NOTIFY,
        GROUP_RENDERING_CONTROL_NOTIFY_MUTE_ONLY,
    };
    use crate::sonos::types::PlaybackStatus;

    #[test]
    fn playing_maps_to_playing() {
        let body = av_transport_notify("PLAYING");
        assert_eq!(parse_av_transport(&body), Some(TransportState::Playing));
        assert_eq!(
            parse_notify(SonosService::AVTransport, &body),
            vec![StateFragment::Transport(PlaybackStatus::Playing)]
        );
    }

    #[test]
    fn stopped_and_paused_map_to_paused() {
        for state in ["STOPPED", "PAUSED_PLAYBACK"] {
            assert_eq!(
                parse_notify(SonosService::AVTransport, &av_transport_notify(state)),
                vec![StateFragment::Transport(PlaybackStatus::Paused)],
                "{state}"
            );
        }
    }

    #[test]
    fn other_transport_states_are_ignored() {
        for state in ["TRANSITIONING", "NO_MEDIA_PRESENT", "BUFFERING"] {
            assert!(
                parse_notify(SonosService::AVTransport, &av_transport_notify(state)).is_empty(),
                "{state}"
            );
        }
    }

    #[test]
    fn track_metadata_before_transport_state_is_skipped() {
        let body = av_transport_notify_with_metadata("PLAYING");
        assert_eq!(parse_av_transport(&body), Some(TransportState::Playing));

        let body = av_transport_notify_with_metadata("PAUSED_PLAYBACK");
        assert_eq!(
            parse_notify(SonosService::AVTransport, &body),
            vec![StateFragment::Transport(PlaybackStatus::Paused)]
        );
    }

    #[test]
    fn av_transport_without_last_change_is_empty() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><Other>1</Other></e:property></e:propertyset>"#;
        assert!(parse_notify(SonosService::AVTransport, body).is_empty());
    }

    #[test]
    fn group_volume_maps_to_volume() {
        assert_eq!(
            parse_notify(SonosService::GroupRenderingControl, GROUP_RENDERING_CONTROL_NOTIFY),
            vec![StateFragment::Volume(27)]
        );
    }

    #[test]
    fn group_event_without_volume_is_empty() {
        assert!(parse_notify(
            SonosService::GroupRenderingControl,
            GROUP_RENDERING_CONTROL_NOTIFY_MUTE_ONLY
        )
        .is_empty());
    }

    #[test]
    fn group_volume_is_clamped() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><GroupVolume>180</GroupVolume></e:property></e:propertyset>"#;
        assert_eq!(parse_group_rendering_control(body), Some(100));
    }
}

//! Group volume control on the coordinator (GroupRenderingControl).

use reqwest::Client;

use crate::protocol_constants::MAX_VOLUME;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapRequestBuilder, SoapResult};
use crate::sonos::types::CoordinatorEndpoint;
use crate::sonos::utils::extract_xml_text;

/// Changes the group volume by a signed amount and returns the new volume.
///
/// The device clamps the result into `0..=100`. An adjustment of 0 changes
/// nothing and is used to read the current volume back.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `coordinator` - Resolved group coordinator
/// * `adjustment` - Signed volume delta
pub async fn set_relative_group_volume(
    client: &Client,
    coordinator: &CoordinatorEndpoint,
    adjustment: i32,
) -> SoapResult<u8> {
    let response = SoapRequestBuilder::new(client, coordinator.host())
        .service(SonosService::GroupRenderingControl)
        .action("SetRelativeGroupVolume")
        .instance_id()
        .arg("Adjustment", adjustment.to_string())
        .send()
        .await?;

    parse_new_volume(&response)
}

fn parse_new_volume(response: &str) -> SoapResult<u8> {
    let volume = extract_xml_text(response, "NewVolume").ok_or(SoapError::Parse("NewVolume"))?;
    let volume: u16 = volume
        .trim()
        .parse()
        .map_err(|_| SoapError::Parse("NewVolume"))?;

    // Never trust the device to stay in range
    Ok(volume.min(u16::from(MAX_VOLUME)) as u8)
}

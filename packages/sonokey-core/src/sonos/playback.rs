//! Transport control commands (AVTransport) on the coordinator.
//!
//! None of these responses carry state; transport changes are observed
//! through AVTransport events.

use reqwest::Client;

use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapRequestBuilder, SoapResult};
use crate::sonos::types::CoordinatorEndpoint;

async fn transport_action(
    client: &Client,
    coordinator: &CoordinatorEndpoint,
    action: &str,
    speed: Option<&str>,
) -> SoapResult<()> {
    let mut request = SoapRequestBuilder::new(client, coordinator.host())
        .service(SonosService::AVTransport)
        .action(action)
        .instance_id();
    if let Some(speed) = speed {
        request = request.arg("Speed", speed);
    }
    request.send().await?;
    Ok(())
}

/// Resumes playback.
pub async fn play(client: &Client, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
    transport_action(client, coordinator, "Play", Some("1")).await
}

/// Pauses playback.
pub async fn pause(client: &Client, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
    transport_action(client, coordinator, "Pause", None).await
}

/// Skips to the next track.
pub async fn next(client: &Client, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
    transport_action(client, coordinator, "Next", None).await
}

/// Skips to the previous track.
pub async fn previous(client: &Client, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
    transport_action(client, coordinator, "Previous", None).await
}

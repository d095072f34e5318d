//! Concrete implementation of the device collaborator traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::SOAP_TIMEOUT_SECS;
use crate::sonos::discovery::{self, DeviceRecord, DiscoveryResult, SsdpConfig};
use crate::sonos::gena::GenaResult;
use crate::sonos::gena_client::{GenaClient, SubscribeResponse};
use crate::sonos::playback;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapResult;
use crate::sonos::traits::{
    SonosDiscovery, SonosEventing, SonosPlayback, SonosTopology, SonosVolumeControl,
};
use crate::sonos::types::{CoordinatorEndpoint, HostEndpoint, ZoneGroup};
use crate::sonos::volume;
use crate::sonos::zone_groups::{self, TopologyResult};

/// Network-backed implementation of every collaborator trait.
///
/// Wraps the free functions of the `sonos` modules so sessions can be built
/// against the traits and tested with fakes.
#[derive(Clone)]
pub struct SonosClientImpl {
    /// HTTP client for SOAP requests.
    client: Client,
    /// HTTP client for GENA requests (shares the connection pool).
    gena: GenaClient,
}

impl std::fmt::Debug for SonosClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonosClientImpl")
            .field("client", &"Client")
            .finish()
    }
}

impl SonosClientImpl {
    /// Creates a client around a shared HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            gena: GenaClient::new(client.clone()),
            client,
        }
    }

    /// Creates a client with its own connection pool and the standard
    /// exchange timeout.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl SonosDiscovery for SonosClientImpl {
    async fn discover(
        &self,
        config: &SsdpConfig,
        multicast: bool,
        broadcast: bool,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<Vec<DeviceRecord>> {
        discovery::discover_devices(config, multicast, broadcast, cancel).await
    }
}

#[async_trait]
impl SonosTopology for SonosClientImpl {
    async fn get_zone_groups(&self, host: &HostEndpoint) -> TopologyResult<Vec<ZoneGroup>> {
        zone_groups::get_zone_groups(&self.client, host).await
    }
}

#[async_trait]
impl SonosPlayback for SonosClientImpl {
    async fn play(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        playback::play(&self.client, coordinator).await
    }

    async fn pause(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        playback::pause(&self.client, coordinator).await
    }

    async fn next(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        playback::next(&self.client, coordinator).await
    }

    async fn previous(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        playback::previous(&self.client, coordinator).await
    }
}

#[async_trait]
impl SonosVolumeControl for SonosClientImpl {
    async fn set_relative_group_volume(
        &self,
        coordinator: &CoordinatorEndpoint,
        adjustment: i32,
    ) -> SoapResult<u8> {
        volume::set_relative_group_volume(&self.client, coordinator, adjustment).await
    }
}

#[async_trait]
impl SonosEventing for SonosClientImpl {
    async fn subscribe(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse> {
        self.gena
            .subscribe(host, service, callback_url, timeout_secs)
            .await
    }

    async fn renew(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64> {
        self.gena.renew(host, service, sid, timeout_secs).await
    }

    async fn unsubscribe(&self, host: &HostEndpoint, service: SonosService, sid: &str) -> bool {
        self.gena.unsubscribe(host, service, sid).await
    }
}

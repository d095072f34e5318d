//! Trait abstractions for the device collaborators.
//!
//! Services depend on these traits rather than on `SonosClientImpl`, so tests
//! can substitute in-memory fakes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::sonos::discovery::{DeviceRecord, DiscoveryResult, SsdpConfig};
use crate::sonos::gena::GenaResult;
use crate::sonos::gena_client::SubscribeResponse;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapResult;
use crate::sonos::types::{CoordinatorEndpoint, HostEndpoint, ZoneGroup};
use crate::sonos::zone_groups::TopologyResult;

/// Local-network device search.
#[async_trait]
pub trait SonosDiscovery: Send + Sync {
    /// Runs one bounded discovery round.
    ///
    /// # Arguments
    /// * `config` - Round timing
    /// * `multicast` / `broadcast` - Which SSDP methods to use
    /// * `cancel` - Aborts the round with `DiscoveryError::Cancelled`
    async fn discover(
        &self,
        config: &SsdpConfig,
        multicast: bool,
        broadcast: bool,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<Vec<DeviceRecord>>;
}

/// Zone group topology queries.
#[async_trait]
pub trait SonosTopology: Send + Sync {
    /// Fetches the full topology from any device.
    async fn get_zone_groups(&self, host: &HostEndpoint) -> TopologyResult<Vec<ZoneGroup>>;
}

/// Transport control on the coordinator.
#[async_trait]
pub trait SonosPlayback: Send + Sync {
    async fn play(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()>;
    async fn pause(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()>;
    async fn next(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()>;
    async fn previous(&self, coordinator: &CoordinatorEndpoint) -> SoapResult<()>;
}

/// Group volume control on the coordinator.
#[async_trait]
pub trait SonosVolumeControl: Send + Sync {
    /// Changes the group volume by `adjustment` and returns the new volume.
    async fn set_relative_group_volume(
        &self,
        coordinator: &CoordinatorEndpoint,
        adjustment: i32,
    ) -> SoapResult<u8>;
}

/// GENA subscription transport.
#[async_trait]
pub trait SonosEventing: Send + Sync {
    async fn subscribe(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse>;

    /// Renews `sid` and returns the granted timeout.
    async fn renew(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64>;

    /// Cancels `sid`. Returns `false` if the device did not acknowledge.
    async fn unsubscribe(&self, host: &HostEndpoint, service: SonosService, sid: &str) -> bool;
}

/// Commands the dispatcher needs.
pub trait SonosCommands: SonosPlayback + SonosVolumeControl {}

/// Blanket implementation for any type implementing both traits.
impl<T: SonosPlayback + SonosVolumeControl> SonosCommands for T {}

/// Every collaborator a session needs.
pub trait SonosClient:
    SonosDiscovery + SonosTopology + SonosPlayback + SonosVolumeControl + SonosEventing
{
}

/// Blanket implementation for any type implementing all traits.
impl<T> SonosClient for T where
    T: SonosDiscovery + SonosTopology + SonosPlayback + SonosVolumeControl + SonosEventing
{
}

//! In-memory fake of every device collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::sonos::discovery::{DeviceRecord, DiscoveryError, DiscoveryMethod, DiscoveryResult, SsdpConfig};
use crate::sonos::gena::{GenaError, GenaResult};
use crate::sonos::gena_client::SubscribeResponse;
use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapError, SoapResult};
use crate::sonos::test_fixtures::household_xml;
use crate::sonos::traits::{
    SonosDiscovery, SonosEventing, SonosPlayback, SonosTopology, SonosVolumeControl,
};
use crate::sonos::types::{CoordinatorEndpoint, HostEndpoint, ZoneGroup};
use crate::sonos::zone_groups::{parse_zone_group_xml, TopologyResult};

type SubscribeHook = Arc<dyn Fn(SonosService, &str) + Send + Sync>;

/// Scriptable fake household.
///
/// Defaults: one discovered device, the [`household_xml`] topology, group
/// volume 30, and every call succeeding.
pub struct MockSonos {
    devices: Mutex<Vec<DeviceRecord>>,
    topology_xml: Mutex<String>,
    volume: Mutex<u8>,
    actions: Mutex<Vec<String>>,
    topology_queries: Mutex<Vec<HostEndpoint>>,
    sids: Mutex<HashMap<SonosService, String>>,
    subscribe_hook: Mutex<Option<SubscribeHook>>,
    command_delay: Mutex<Option<Duration>>,
    fail_discovery: AtomicBool,
    hang_discovery: AtomicBool,
    fail_commands: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_renew: AtomicBool,
    subscribe_calls: AtomicUsize,
    renew_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl MockSonos {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(vec![DeviceRecord::new(
                "RINCON_KITCHEN01400".into(),
                "192.168.1.30".into(),
                Some("http://192.168.1.30:1400/xml/device_description.xml".into()),
                DiscoveryMethod::SsdpMulticast,
            )]),
            topology_xml: Mutex::new(household_xml()),
            volume: Mutex::new(30),
            actions: Mutex::new(Vec::new()),
            topology_queries: Mutex::new(Vec::new()),
            sids: Mutex::new(HashMap::new()),
            subscribe_hook: Mutex::new(None),
            command_delay: Mutex::new(None),
            fail_discovery: AtomicBool::new(false),
            hang_discovery: AtomicBool::new(false),
            fail_commands: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_renew: AtomicBool::new(false),
            subscribe_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_devices(&self, devices: Vec<DeviceRecord>) {
        *self.devices.lock() = devices;
    }

    pub fn set_topology_xml(&self, xml: String) {
        *self.topology_xml.lock() = xml;
    }

    pub fn set_volume(&self, volume: u8) {
        *self.volume.lock() = volume;
    }

    pub fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.lock() = Some(delay);
    }

    /// Runs `hook` with each granted SID before the SUBSCRIBE response is
    /// returned, the way a device's initial NOTIFY can overtake it.
    pub fn on_subscribe(&self, hook: impl Fn(SonosService, &str) + Send + Sync + 'static) {
        *self.subscribe_hook.lock() = Some(Arc::new(hook));
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// Makes discovery wait until cancelled.
    pub fn hang_discovery(&self, hang: bool) {
        self.hang_discovery.store(hang, Ordering::SeqCst);
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_renew(&self, fail: bool) {
        self.fail_renew.store(fail, Ordering::SeqCst);
    }

    /// Actions received so far, e.g. `["Play", "SetRelativeGroupVolume(2)"]`.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().clone()
    }

    pub fn topology_queries(&self) -> Vec<HostEndpoint> {
        self.topology_queries.lock().clone()
    }

    /// SID of the most recent subscription to `service`.
    pub fn sid_for(&self, service: SonosService) -> Option<String> {
        self.sids.lock().get(&service).cloned()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    async fn command(&self, action: String) -> SoapResult<()> {
        let delay = *self.command_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.actions.lock().push(action);
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(SoapError::Fault("UPnPError (UPnP error 701)".into()));
        }
        Ok(())
    }
}

impl Default for MockSonos {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SonosDiscovery for MockSonos {
    async fn discover(
        &self,
        _config: &SsdpConfig,
        _multicast: bool,
        _broadcast: bool,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<Vec<DeviceRecord>> {
        if self.hang_discovery.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return Err(DiscoveryError::Cancelled);
        }
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(DiscoveryError::NoInterfaces);
        }
        Ok(self.devices.lock().clone())
    }
}

#[async_trait]
impl SonosTopology for MockSonos {
    async fn get_zone_groups(&self, host: &HostEndpoint) -> TopologyResult<Vec<ZoneGroup>> {
        self.topology_queries.lock().push(host.clone());
        let xml = self.topology_xml.lock().clone();
        parse_zone_group_xml(&xml)
    }
}

#[async_trait]
impl SonosPlayback for MockSonos {
    async fn play(&self, _coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        self.command("Play".into()).await
    }

    async fn pause(&self, _coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        self.command("Pause".into()).await
    }

    async fn next(&self, _coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        self.command("Next".into()).await
    }

    async fn previous(&self, _coordinator: &CoordinatorEndpoint) -> SoapResult<()> {
        self.command("Previous".into()).await
    }
}

#[async_trait]
impl SonosVolumeControl for MockSonos {
    async fn set_relative_group_volume(
        &self,
        _coordinator: &CoordinatorEndpoint,
        adjustment: i32,
    ) -> SoapResult<u8> {
        self.command(format!("SetRelativeGroupVolume({})", adjustment))
            .await?;
        let mut volume = self.volume.lock();
        *volume = (i32::from(*volume) + adjustment).clamp(0, 100) as u8;
        Ok(*volume)
    }
}

#[async_trait]
impl SonosEventing for MockSonos {
    async fn subscribe(
        &self,
        _host: &HostEndpoint,
        service: SonosService,
        _callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse> {
        let n = self.subscribe_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(GenaError::SubscriptionFailed(503));
        }
        let sid = format!("uuid:RINCON_SUB-{}", n);
        self.sids.lock().insert(service, sid.clone());
        let hook = self.subscribe_hook.lock().clone();
        if let Some(hook) = hook {
            hook(service, &sid);
        }
        Ok(SubscribeResponse { sid, timeout_secs })
    }

    async fn renew(
        &self,
        _host: &HostEndpoint,
        _service: SonosService,
        _sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_renew.load(Ordering::SeqCst) {
            return Err(GenaError::RenewalFailed(412));
        }
        Ok(timeout_secs)
    }

    async fn unsubscribe(&self, _host: &HostEndpoint, _service: SonosService, _sid: &str) -> bool {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

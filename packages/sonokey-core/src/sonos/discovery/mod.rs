//! Device discovery.
//!
//! Runs the enabled SSDP methods concurrently for one bounded window and
//! merges their results by device id.

pub mod ssdp;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use ssdp::SsdpConfig;
pub use types::{DeviceRecord, DiscoveryError, DiscoveryMethod, DiscoveryResult};

/// Grace period on top of the collection window before a round is abandoned.
const ROUND_GRACE: Duration = Duration::from_secs(2);

/// Runs one discovery round.
///
/// Returns every device found by any enabled method, sorted by id. An empty
/// list is a valid outcome; the caller decides whether that is fatal.
///
/// # Errors
///
/// - `NoMethodsEnabled` if both methods are disabled
/// - `AllMethodsFailed` if every enabled method failed to start
/// - `Cancelled` if `cancel` fires before the round completes
pub async fn discover_devices(
    config: &SsdpConfig,
    multicast: bool,
    broadcast: bool,
    cancel: &CancellationToken,
) -> DiscoveryResult<Vec<DeviceRecord>> {
    let methods: Vec<DiscoveryMethod> = [
        (multicast, DiscoveryMethod::SsdpMulticast),
        (broadcast, DiscoveryMethod::SsdpBroadcast),
    ]
    .into_iter()
    .filter_map(|(enabled, method)| enabled.then_some(method))
    .collect();

    if methods.is_empty() {
        return Err(DiscoveryError::NoMethodsEnabled);
    }

    let round = futures::future::join_all(
        methods
            .iter()
            .map(|&method| async move { (method, ssdp::discover_ssdp(config, method, cancel).await) }),
    );

    let results = match tokio::time::timeout(config.discovery_timeout + ROUND_GRACE, round).await {
        Ok(results) => results,
        Err(_) => {
            log::warn!("[SSDP] Discovery round exceeded its window, abandoning");
            return Ok(Vec::new());
        }
    };

    let mut merged: BTreeMap<String, DeviceRecord> = BTreeMap::new();
    let mut failures = Vec::new();

    for (method, result) in results {
        match result {
            Ok(records) => {
                for record in records {
                    match merged.get_mut(&record.uuid) {
                        Some(existing) => existing.merge(record),
                        None => {
                            merged.insert(record.uuid.clone(), record);
                        }
                    }
                }
            }
            Err(DiscoveryError::Cancelled) => return Err(DiscoveryError::Cancelled),
            Err(e) => {
                log::warn!("[SSDP] {} failed: {}", method, e);
                failures.push((method, e.to_string()));
            }
        }
    }

    if failures.len() == methods.len() {
        return Err(DiscoveryError::AllMethodsFailed(failures));
    }

    log::info!("[SSDP] Discovery complete: {} device(s)", merged.len());
    Ok(merged.into_values().collect())
}

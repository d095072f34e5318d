//! GENA subscription bookkeeping.
//!
//! Pure data structure, no I/O. Expiry uses `tokio::time::Instant` so the
//! renewal schedule follows the runtime clock.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use super::services::SonosService;
use super::types::HostEndpoint;

/// Reverse-index key: one subscription per (device, service).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct SubscriptionKey {
    pub host: HostEndpoint,
    pub service: SonosService,
}

impl SubscriptionKey {
    pub fn new(host: &HostEndpoint, service: SonosService) -> Self {
        Self {
            host: host.clone(),
            service,
        }
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    host: HostEndpoint,
    service: SonosService,
    callback_url: String,
    expires_at: Instant,
}

/// A subscription that is due for renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringSubscription {
    pub sid: String,
    pub host: HostEndpoint,
    pub service: SonosService,
    pub callback_url: String,
}

/// State container for active subscriptions, keyed by SID.
#[derive(Default)]
pub struct GenaSubscriptionStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    /// Reverse lookup for deduplication.
    keys: RwLock<HashMap<SubscriptionKey, String>>,
    /// In-flight SUBSCRIBEs.
    pending: RwLock<HashSet<SubscriptionKey>>,
}

impl GenaSubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_subscribed(&self, host: &HostEndpoint, service: SonosService) -> bool {
        self.keys
            .read()
            .contains_key(&SubscriptionKey::new(host, service))
    }

    /// Marks a SUBSCRIBE as in flight.
    ///
    /// Returns `false` if the pair is already subscribed or pending.
    pub fn try_mark_pending(&self, host: &HostEndpoint, service: SonosService) -> bool {
        let key = SubscriptionKey::new(host, service);
        // Lock order: keys, then pending
        let keys = self.keys.read();
        if keys.contains_key(&key) {
            return false;
        }
        self.pending.write().insert(key)
    }

    pub fn clear_pending(&self, host: &HostEndpoint, service: SonosService) {
        self.pending
            .write()
            .remove(&SubscriptionKey::new(host, service));
    }

    /// Records a granted subscription and clears its pending flag.
    pub fn insert(
        &self,
        sid: String,
        host: &HostEndpoint,
        service: SonosService,
        callback_url: String,
        timeout_secs: u64,
    ) {
        let key = SubscriptionKey::new(host, service);
        let mut keys = self.keys.write();
        self.subscriptions.write().insert(
            sid.clone(),
            Subscription {
                host: host.clone(),
                service,
                callback_url,
                expires_at: Instant::now() + Duration::from_secs(timeout_secs),
            },
        );
        keys.insert(key.clone(), sid);
        self.pending.write().remove(&key);
    }

    /// Removes a subscription by SID and returns its device and service.
    pub fn remove(&self, sid: &str) -> Option<(HostEndpoint, SonosService)> {
        let mut keys = self.keys.write();
        let sub = self.subscriptions.write().remove(sid)?;
        keys.remove(&SubscriptionKey::new(&sub.host, sub.service));
        Some((sub.host, sub.service))
    }

    /// Looks up the device and service for a SID.
    pub fn get(&self, sid: &str) -> Option<(HostEndpoint, SonosService)> {
        self.subscriptions
            .read()
            .get(sid)
            .map(|s| (s.host.clone(), s.service))
    }

    pub fn update_expiry(&self, sid: &str, timeout_secs: u64) {
        if let Some(sub) = self.subscriptions.write().get_mut(sid) {
            sub.expires_at = Instant::now() + Duration::from_secs(timeout_secs);
        }
    }

    /// Returns subscriptions expiring within `buffer`.
    pub fn get_expiring(&self, buffer: Duration) -> Vec<ExpiringSubscription> {
        let now = Instant::now();
        self.subscriptions
            .read()
            .iter()
            .filter(|(_, sub)| sub.expires_at.saturating_duration_since(now) < buffer)
            .map(|(sid, sub)| ExpiringSubscription {
                sid: sid.clone(),
                host: sub.host.clone(),
                service: sub.service,
                callback_url: sub.callback_url.clone(),
            })
            .collect()
    }

    pub fn get_all_sids(&self) -> Vec<String> {
        self.subscriptions.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Whether any SUBSCRIBE is in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.read().is_empty()
    }
}

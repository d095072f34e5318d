//! GENA (UPnP General Event Notification Architecture) subscription management.
//!
//! [`GenaSubscriptionManager`] composes the subscription store with the
//! eventing transport, renews subscriptions in the background, and turns
//! NOTIFY bodies into state fragments.
//!
//! A device may deliver the initial NOTIFY before its SUBSCRIBE response
//! reaches us. Such NOTIFYs are held briefly while a SUBSCRIBE is in flight
//! and handed back by [`GenaSubscriptionManager::subscribe`] once the SID is
//! known.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::gena_parser;
use super::gena_store::GenaSubscriptionStore;
use super::services::SonosService;
use super::traits::SonosEventing;
use super::types::HostEndpoint;
use crate::protocol_constants::{
    GENA_EARLY_NOTIFY_GRACE_SECS, GENA_RENEWAL_BUFFER_SECS, GENA_RENEWAL_CHECK_SECS,
    GENA_SUBSCRIPTION_TIMEOUT_SECS, MAX_GENA_EARLY_NOTIFIES,
};
use crate::state::StateFragment;

/// Errors that can occur during GENA subscription operations.
#[derive(Debug, Error)]
pub enum GenaError {
    /// HTTP request to the device failed or timed out.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// SUBSCRIBE returned a non-success status code.
    #[error("Subscription failed with status {0}")]
    SubscriptionFailed(u16),

    /// Renewal returned a non-success status code.
    #[error("Renewal failed with status {0}")]
    RenewalFailed(u16),

    /// The response was missing the SID header.
    #[error("Missing SID in subscription response")]
    MissingSid,

    /// A GENA method name was rejected by the HTTP stack.
    #[error("Invalid HTTP method {0}")]
    InvalidMethod(&'static str),

    /// The service does not publish events.
    #[error("{0} is not an evented service")]
    NotEvented(SonosService),

    /// The manager has been shut down.
    #[error("Subscription manager is shut down")]
    ShutDown,
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

/// Events raised by the manager outside of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenaEvent {
    /// Renewal and the immediate re-subscribe both failed.
    SubscriptionLost {
        host: HostEndpoint,
        service: SonosService,
        reason: String,
    },
    /// A NOTIFY that beat the response of a background re-subscribe.
    Notify(ParsedNotify),
}

/// Subscription lifetime and renewal schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenaTiming {
    /// Lifetime requested in SUBSCRIBE and renewal.
    pub subscription_timeout_secs: u64,
    /// Renew when fewer than this many seconds remain.
    pub renewal_buffer: Duration,
    /// Interval between renewal checks.
    pub renewal_check: Duration,
}

impl Default for GenaTiming {
    fn default() -> Self {
        Self {
            subscription_timeout_secs: GENA_SUBSCRIPTION_TIMEOUT_SECS,
            renewal_buffer: Duration::from_secs(GENA_RENEWAL_BUFFER_SECS),
            renewal_check: Duration::from_secs(GENA_RENEWAL_CHECK_SECS),
        }
    }
}

/// Notification routed to a known subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNotify {
    pub host: HostEndpoint,
    pub service: SonosService,
    pub fragments: Vec<StateFragment>,
}

/// A NOTIFY whose SID was not known yet when it arrived.
struct EarlyNotify {
    sid: String,
    body: String,
    received: Instant,
}

/// Manages GENA subscriptions for one session.
pub struct GenaSubscriptionManager {
    store: GenaSubscriptionStore,
    eventing: Arc<dyn SonosEventing>,
    timing: GenaTiming,
    event_tx: mpsc::UnboundedSender<GenaEvent>,
    cancel_token: CancellationToken,
    /// Held early NOTIFYs. Taken before any store access that decides
    /// whether a SID is known, so a NOTIFY is either routed or held.
    early: Mutex<Vec<EarlyNotify>>,
}

impl GenaSubscriptionManager {
    /// Creates a manager and the receiver for its events.
    ///
    /// `cancel_token` stops the renewal task; pass a child of the session
    /// token. The channel is unbounded so the renewal task never blocks.
    pub fn new(
        eventing: Arc<dyn SonosEventing>,
        timing: GenaTiming,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<GenaEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let manager = Self {
            store: GenaSubscriptionStore::new(),
            eventing,
            timing,
            event_tx,
            cancel_token,
            early: Mutex::new(Vec::new()),
        };
        (manager, event_rx)
    }

    #[must_use]
    pub fn is_subscribed(&self, host: &HostEndpoint, service: SonosService) -> bool {
        self.store.is_subscribed(host, service)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    fn emit(&self, event: GenaEvent) {
        if self.event_tx.send(event).is_err() {
            log::debug!("[GENA] Event dropped, no receiver");
        }
    }

    fn emit_subscription_lost(&self, host: HostEndpoint, service: SonosService, reason: String) {
        self.emit(GenaEvent::SubscriptionLost {
            host,
            service,
            reason,
        });
    }

    /// Spawns the renewal task.
    ///
    /// The task exits when the manager's cancellation token fires.
    pub fn start_renewal_task(self: Arc<Self>) -> JoinHandle<()> {
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.timing.renewal_check);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        log::debug!("[GENA] Renewal task shutting down");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                self.renew_expiring().await;
            }
        })
    }

    /// Renews every subscription that is inside the renewal buffer.
    pub async fn renew_expiring(&self) {
        for sub in self.store.get_expiring(self.timing.renewal_buffer) {
            if self.cancel_token.is_cancelled() {
                return;
            }

            match self
                .eventing
                .renew(
                    &sub.host,
                    sub.service,
                    &sub.sid,
                    self.timing.subscription_timeout_secs,
                )
                .await
            {
                Ok(timeout_secs) => {
                    self.store.update_expiry(&sub.sid, timeout_secs);
                    log::debug!(
                        "[GENA] Renewed {} on {} ({})",
                        sub.sid,
                        sub.host,
                        sub.service
                    );
                }
                Err(e) => {
                    log::warn!(
                        "[GENA] Failed to renew {} on {}: {}",
                        sub.sid,
                        sub.host,
                        e
                    );
                    self.store.remove(&sub.sid);

                    log::info!("[GENA] Re-subscribing to {} on {}", sub.service, sub.host);
                    match self
                        .subscribe(&sub.host, sub.service, &sub.callback_url)
                        .await
                    {
                        Ok(replayed) => {
                            for notify in replayed {
                                self.emit(GenaEvent::Notify(notify));
                            }
                        }
                        Err(re_err) => {
                            log::error!(
                                "[GENA] Re-subscription to {} on {} failed: {}",
                                sub.service,
                                sub.host,
                                re_err
                            );
                            self.emit_subscription_lost(
                                sub.host,
                                sub.service,
                                re_err.to_string(),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Subscribes to `service` on `host`.
    ///
    /// Returns the NOTIFYs for the new SID that arrived before the SUBSCRIBE
    /// response, in arrival order. Returns immediately with nothing if the
    /// pair is already subscribed or a SUBSCRIBE for it is in flight.
    pub async fn subscribe(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        callback_url: &str,
    ) -> GenaResult<Vec<ParsedNotify>> {
        if self.cancel_token.is_cancelled() {
            return Err(GenaError::ShutDown);
        }

        if !self.store.try_mark_pending(host, service) {
            log::debug!(
                "[GENA] Subscription already exists or in flight for {} on {}",
                service,
                host
            );
            return Ok(Vec::new());
        }

        match self
            .eventing
            .subscribe(host, service, callback_url, self.timing.subscription_timeout_secs)
            .await
        {
            Ok(response) => {
                let held = {
                    let mut early = self.early.lock();
                    self.store.insert(
                        response.sid.clone(),
                        host,
                        service,
                        callback_url.to_string(),
                        response.timeout_secs,
                    );
                    take_early(&mut early, &response.sid)
                };
                log::info!(
                    "[GENA] Subscribed to {} on {} (SID: {}, {}s)",
                    service,
                    host,
                    response.sid,
                    response.timeout_secs
                );

                // Shutdown raced the SUBSCRIBE
                if self.cancel_token.is_cancelled() {
                    self.unsubscribe(&response.sid).await;
                    return Err(GenaError::ShutDown);
                }

                if !held.is_empty() {
                    log::debug!(
                        "[GENA] Replaying {} early NOTIFY for {}",
                        held.len(),
                        response.sid
                    );
                }
                Ok(held
                    .iter()
                    .map(|body| self.parse(host.clone(), service, body))
                    .collect())
            }
            Err(e) => {
                let mut early = self.early.lock();
                self.store.clear_pending(host, service);
                if !self.store.has_pending() {
                    early.clear();
                }
                Err(e)
            }
        }
    }

    /// Cancels one subscription. It is removed locally even if the device
    /// does not answer.
    pub async fn unsubscribe(&self, sid: &str) {
        let Some((host, service)) = self.store.get(sid) else {
            return;
        };

        let acknowledged = self.eventing.unsubscribe(&host, service, sid).await;
        self.store.remove(sid);

        if acknowledged {
            log::info!("[GENA] Unsubscribed {} from {} ({})", sid, host, service);
        } else {
            log::warn!("[GENA] Unsubscribe of {} not acknowledged, removed locally", sid);
        }
    }

    /// Cancels every active subscription.
    pub async fn unsubscribe_all(&self) {
        let sids = self.store.get_all_sids();
        futures::future::join_all(sids.iter().map(|sid| self.unsubscribe(sid))).await;
    }

    /// Stops the renewal task and cancels every subscription.
    pub async fn shutdown(&self) {
        log::info!("[GENA] Shutting down");
        self.cancel_token.cancel();
        self.unsubscribe_all().await;
    }

    /// Parses a NOTIFY for a known subscription.
    ///
    /// Returns `None` for an unknown SID. While a SUBSCRIBE is in flight an
    /// unknown SID may be the one about to be granted, so the NOTIFY is held
    /// for [`GENA_EARLY_NOTIFY_GRACE_SECS`] and returned by `subscribe`.
    pub fn handle_notify(&self, sid: &str, body: &str) -> Option<ParsedNotify> {
        let known = {
            let mut early = self.early.lock();
            let known = self.store.get(sid);
            if known.is_none() && self.store.has_pending() {
                hold_early(&mut early, sid, body);
                log::debug!("[GENA] Holding NOTIFY for {} until SUBSCRIBE completes", sid);
                return None;
            }
            known
        };

        let Some((host, service)) = known else {
            log::debug!("[GENA] NOTIFY for unknown SID {}", sid);
            return None;
        };

        Some(self.parse(host, service, body))
    }

    fn parse(&self, host: HostEndpoint, service: SonosService, body: &str) -> ParsedNotify {
        let fragments = gena_parser::parse_notify(service, body);
        log::trace!(
            "[GENA] NOTIFY {} from {}: {:?}",
            service,
            host,
            fragments
        );

        ParsedNotify {
            host,
            service,
            fragments,
        }
    }
}

fn early_grace() -> Duration {
    Duration::from_secs(GENA_EARLY_NOTIFY_GRACE_SECS)
}

fn hold_early(early: &mut Vec<EarlyNotify>, sid: &str, body: &str) {
    let now = Instant::now();
    early.retain(|n| now.duration_since(n.received) < early_grace());
    if early.len() >= MAX_GENA_EARLY_NOTIFIES {
        early.remove(0);
    }
    early.push(EarlyNotify {
        sid: sid.to_string(),
        body: body.to_string(),
        received: now,
    });
}

/// Removes and returns the held bodies for `sid` that are still in grace.
fn take_early(early: &mut Vec<EarlyNotify>, sid: &str) -> Vec<String> {
    let now = Instant::now();
    let mut taken = Vec::new();
    early.retain(|n| {
        if n.sid != sid {
            return now.duration_since(n.received) < early_grace();
        }
        if now.duration_since(n.received) < early_grace() {
            taken.push(n.body.clone());
        }
        false
    });
    taken
}

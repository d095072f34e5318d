//! Push subscription on the coordinator and its health state machine.
//!
//! `Unsubscribed -> Subscribing -> Subscribed`, with `Failed` entered on any
//! subscription failure. From `Failed` a new attempt starts after the
//! resubscribe delay, so commands keep working while events are down.
//!
//! Pushes are merged into the shared [`StateSink`] as soon as they are
//! routed, including the initial NOTIFY that can overtake the SUBSCRIBE
//! response.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state_sink::StateSink;
use crate::events::{EventEmitter, HealthEvent, SubscriptionStatus};
use crate::sonos::gena::{GenaEvent, GenaSubscriptionManager, GenaTiming};
use crate::sonos::services::SonosService;
use crate::sonos::traits::SonosEventing;
use crate::sonos::types::CoordinatorEndpoint;
use crate::state::SessionState;

/// Subscription settings for one session.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Full callback URL given to the coordinator.
    pub callback_url: String,
    pub timing: GenaTiming,
    /// Wait between a failure and the next attempt.
    pub resubscribe_delay: Duration,
}

/// Keeps the coordinator's AVTransport and GroupRenderingControl
/// subscriptions alive.
pub struct EventSubscriber {
    gena: Arc<GenaSubscriptionManager>,
    coordinator: CoordinatorEndpoint,
    config: SubscriberConfig,
    sink: Arc<StateSink>,
    emitter: Arc<dyn EventEmitter>,
    status_tx: watch::Sender<SubscriptionStatus>,
    cancel: CancellationToken,
    /// Manager events, taken by `start`.
    events: Mutex<Option<mpsc::UnboundedReceiver<GenaEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventSubscriber {
    /// Creates an idle subscriber. Nothing is sent until [`start`](Self::start).
    ///
    /// The subscriber can route NOTIFYs as soon as it exists, so it can be
    /// published to the callback server before the first SUBSCRIBE goes out.
    pub fn new(
        eventing: Arc<dyn SonosEventing>,
        coordinator: CoordinatorEndpoint,
        config: SubscriberConfig,
        sink: Arc<StateSink>,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (gena, events) = GenaSubscriptionManager::new(eventing, config.timing, cancel.clone());
        let (status_tx, _) = watch::channel(SubscriptionStatus::Unsubscribed);

        Arc::new(Self {
            gena: Arc::new(gena),
            coordinator,
            config,
            sink,
            emitter,
            status_tx,
            cancel,
            events: Mutex::new(Some(events)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Subscribes to the coordinator and starts the background tasks.
    ///
    /// A failed first attempt is not an error: the subscriber reports
    /// `Failed` and keeps retrying until its token is cancelled.
    pub async fn start(self: &Arc<Self>) {
        let Some(events) = self.events.lock().take() else {
            log::debug!("[Subscriber] Already started");
            return;
        };

        let subscribed = self.subscribe_all().await;
        if self.cancel.is_cancelled() {
            return;
        }

        let renewal = Arc::clone(&self.gena).start_renewal_task();
        let supervisor = tokio::spawn(Arc::clone(self).supervise(events, !subscribed));
        self.tasks.lock().extend([renewal, supervisor]);
    }

    /// Current subscription state.
    #[must_use]
    pub fn status(&self) -> SubscriptionStatus {
        *self.status_tx.borrow()
    }

    /// Receiver for subscription state changes.
    pub fn watch_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status_tx.subscribe()
    }

    /// State merged so far.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.sink.snapshot()
    }

    fn set_status(&self, status: SubscriptionStatus, reason: Option<String>) {
        let previous = self.status_tx.send_replace(status);
        if previous == status {
            return;
        }

        match &reason {
            Some(reason) => log::warn!("[Subscriber] {} -> {}: {}", previous, status, reason),
            None => log::info!("[Subscriber] {} -> {}", previous, status),
        }
        self.emitter
            .emit_health(HealthEvent::Subscription { status, reason });
    }

    /// Subscribes every evented service that is not yet subscribed.
    ///
    /// Returns `true` when all of them are active.
    async fn subscribe_all(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.set_status(SubscriptionStatus::Subscribing, None);

        let host = self.coordinator.host();
        let mut failures = Vec::new();
        for service in SonosService::EVENTED {
            match self
                .gena
                .subscribe(host, service, &self.config.callback_url)
                .await
            {
                Ok(early) => early.into_iter().for_each(|n| self.sink.apply_notify(n)),
                Err(e) => failures.push(format!("{}: {}", service, e)),
            }
        }

        if self.cancel.is_cancelled() {
            return false;
        }
        if failures.is_empty() {
            self.set_status(SubscriptionStatus::Subscribed, None);
            true
        } else {
            self.set_status(SubscriptionStatus::Failed, Some(failures.join("; ")));
            false
        }
    }

    async fn supervise(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<GenaEvent>, mut retry: bool) {
        loop {
            if retry {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.resubscribe_delay) => {}
                }
                retry = !self.subscribe_all().await;
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(GenaEvent::Notify(notify)) => self.sink.apply_notify(notify),
                    Some(GenaEvent::SubscriptionLost { service, reason, .. }) => {
                        self.set_status(
                            SubscriptionStatus::Failed,
                            Some(format!("{} lost: {}", service, reason)),
                        );
                        // One retry covers every loss reported so far
                        while let Ok(event) = events.try_recv() {
                            if let GenaEvent::Notify(notify) = event {
                                self.sink.apply_notify(notify);
                            }
                        }
                        retry = true;
                    }
                    None => break,
                },
            }
        }
        log::debug!("[Subscriber] Supervisor stopped");
    }

    /// Routes a NOTIFY and merges its fragments.
    ///
    /// Returns `false` if the SID is not (yet) known.
    pub fn handle_notify(&self, sid: &str, body: &str) -> bool {
        match self.gena.handle_notify(sid, body) {
            Some(notify) => {
                self.sink.apply_notify(notify);
                true
            }
            None => false,
        }
    }

    /// Cancels the subscriptions and waits for the background tasks.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.gena.shutdown().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("[Subscriber] Background task ended abnormally: {}", e);
            }
        }
        self.set_status(SubscriptionStatus::Unsubscribed, None);
    }
}

//! The control session for one group.
//!
//! [`ActiveSession::establish`] runs the prerequisite chain once (permission
//! gate, discovery, topology resolution) and then starts the push
//! subscription. Commands only exist on an established session, so nothing
//! on the command or event path can run before a coordinator is known.
//!
//! Pushes are routed from the moment the first SUBSCRIBE is sent: the
//! [`SessionHandle`] publishes the subscriber while the session is still
//! being set up, and both share one [`StateSink`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::command_dispatcher::{self, Action, CommandResult};
use super::event_subscriber::{EventSubscriber, SubscriberConfig};
use super::state_sink::StateSink;
use super::topology_resolver::{resolve_coordinator, ResolvedGroup};
use crate::context::UrlBuilder;
use crate::error::{SonokeyError, SonokeyResult};
use crate::events::{EventEmitter, SubscriptionStatus};
use crate::keys::RemoteKey;
use crate::permissions::{wait_for_permissions, PermissionGate};
use crate::sonos::gena::GenaTiming;
use crate::sonos::traits::{SonosClient, SonosCommands, SonosEventing};
use crate::sonos::types::CoordinatorEndpoint;
use crate::state::{Config, FragmentSource, SessionState, StateFragment};

/// A resolved session: coordinator known, subscription running.
pub struct ActiveSession {
    config: Config,
    group: ResolvedGroup,
    commands: Arc<dyn SonosCommands>,
    sink: Arc<StateSink>,
    subscriber: Arc<EventSubscriber>,
    cancel: CancellationToken,
}

impl ActiveSession {
    /// Establishes a session for `config.target_group`.
    ///
    /// Any failure before the coordinator is resolved aborts establishment;
    /// there is no partial session. A subscription failure is not fatal and
    /// a failed initial volume load is only logged.
    ///
    /// `cancel` is the session's root token; cancelling it aborts a pending
    /// establishment and later tears down the background tasks.
    pub async fn establish<C>(
        client: Arc<C>,
        config: Config,
        gate: &dyn PermissionGate,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> SonokeyResult<Arc<Self>>
    where
        C: SonosClient + 'static,
    {
        Self::establish_with(client, config, gate, emitter, cancel, |_, _| {}).await
    }

    /// Like [`establish`](Self::establish), calling `on_subscribing` with
    /// the resolved group and its subscriber right before the first
    /// SUBSCRIBE is sent.
    pub async fn establish_with<C, F>(
        client: Arc<C>,
        config: Config,
        gate: &dyn PermissionGate,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
        on_subscribing: F,
    ) -> SonokeyResult<Arc<Self>>
    where
        C: SonosClient + 'static,
        F: FnOnce(&ResolvedGroup, &Arc<EventSubscriber>),
    {
        config.validate().map_err(SonokeyError::Config)?;
        let callback_url = UrlBuilder::from_base(&config.callback_base_url)?.gena_callback_url();

        wait_for_permissions(
            gate,
            Duration::from_secs(config.permission_poll_secs),
            Duration::from_secs(config.permission_prompt_secs),
            &cancel,
        )
        .await?;

        log::info!("[Session] Discovering devices");
        let devices = client
            .discover(
                &config.ssdp_config(),
                config.discovery_ssdp_multicast,
                config.discovery_ssdp_broadcast,
                &cancel,
            )
            .await?;
        if devices.is_empty() {
            return Err(SonokeyError::NoDevices);
        }
        log::info!("[Session] Found {} device(s)", devices.len());

        let group = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SonokeyError::Cancelled("topology")),
            resolved = resolve_coordinator(&*client, &devices, &config.target_group) => resolved?,
        };

        let sink = Arc::new(StateSink::new(Arc::clone(&emitter)));
        let subscriber = EventSubscriber::new(
            Arc::clone(&client) as Arc<dyn SonosEventing>,
            group.coordinator.clone(),
            SubscriberConfig {
                callback_url,
                timing: GenaTiming {
                    subscription_timeout_secs: config.subscription_timeout_secs,
                    renewal_buffer: Duration::from_secs(config.renewal_buffer_secs),
                    renewal_check: Duration::from_secs(config.renewal_check_secs),
                },
                resubscribe_delay: Duration::from_secs(config.resubscribe_delay_secs),
            },
            Arc::clone(&sink),
            emitter,
            cancel.child_token(),
        );
        on_subscribing(&group, &subscriber);
        subscriber.start().await;

        let session = Arc::new(Self {
            config,
            group,
            commands: client as Arc<dyn SonosCommands>,
            sink,
            subscriber,
            cancel,
        });
        log::info!(
            "[Session] Connected to {:?} via {}",
            session.group.name,
            session.group.coordinator
        );

        if let Err(e) = session.execute(Action::LoadVolume).await {
            log::warn!("[Session] Initial volume load failed: {}", e);
        }

        Ok(session)
    }

    #[must_use]
    pub fn group(&self) -> &ResolvedGroup {
        &self.group
    }

    #[must_use]
    pub fn coordinator(&self) -> &CoordinatorEndpoint {
        &self.group.coordinator
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.sink.snapshot()
    }

    #[must_use]
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.subscriber.status()
    }

    /// Routes a key press and returns the resulting state.
    pub async fn press(&self, key: RemoteKey) -> CommandResult<SessionState> {
        let action = key.action(&self.config, self.sink.transport());
        log::debug!("[Session] Key {} -> {}", key, action);
        self.execute(action).await
    }

    /// Executes one action and merges its result.
    ///
    /// On failure the state is left untouched.
    pub async fn execute(&self, action: Action) -> CommandResult<SessionState> {
        let fragment =
            command_dispatcher::execute(&*self.commands, action, &self.group.coordinator, &self.cancel)
                .await?;

        if let Some(fragment) = fragment {
            self.sink.apply(fragment, FragmentSource::Command);
        } else if self.config.optimistic_transport {
            if let Some(status) = action.optimistic_status() {
                self.sink
                    .apply(StateFragment::Transport(status), FragmentSource::Optimistic);
            }
        }
        Ok(self.sink.snapshot())
    }

    /// Handles a NOTIFY body. Returns `false` for an unknown SID.
    pub fn handle_notify(&self, sid: &str, body: &str) -> bool {
        self.subscriber.handle_notify(sid, body)
    }

    /// Tears the session down.
    ///
    /// Closes the state first so late results are dropped, then cancels
    /// in-flight work and removes the subscriptions.
    pub async fn shutdown(&self) {
        log::info!("[Session] Shutting down");
        self.sink.close();
        self.cancel.cancel();
        self.subscriber.shutdown().await;
    }
}

/// Coordinator resolution state of the process.
#[derive(Clone, Default)]
pub enum Coordinator {
    #[default]
    Unresolved,
    /// Group resolved and pushes routed; the session is still being set up.
    Subscribing {
        group: ResolvedGroup,
        subscriber: Arc<EventSubscriber>,
    },
    Resolved(Arc<ActiveSession>),
}

/// What `/api/state` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub connected: bool,
    pub group: Option<String>,
    pub coordinator: Option<CoordinatorEndpoint>,
    #[serde(flatten)]
    pub state: SessionState,
    pub subscription: SubscriptionStatus,
}

/// Shared slot for the session, used by the HTTP layer and the key source.
#[derive(Default)]
pub struct SessionHandle {
    inner: RwLock<Coordinator>,
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Establishes a session and publishes it in this slot.
    ///
    /// The subscriber is published before the first SUBSCRIBE, so NOTIFYs
    /// sent while subscribing or loading the volume reach the state. If the
    /// slot is shut down meanwhile, the new session is torn down and
    /// `Cancelled("subscription")` is returned.
    pub async fn establish<C>(
        &self,
        client: Arc<C>,
        config: Config,
        gate: &dyn PermissionGate,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> SonokeyResult<Arc<ActiveSession>>
    where
        C: SonosClient + 'static,
    {
        let publish = |group: &ResolvedGroup, subscriber: &Arc<EventSubscriber>| {
            *self.inner.write() = Coordinator::Subscribing {
                group: group.clone(),
                subscriber: Arc::clone(subscriber),
            };
        };
        let session =
            ActiveSession::establish_with(client, config, gate, emitter, cancel, publish).await?;

        let published = {
            let mut inner = self.inner.write();
            match &*inner {
                Coordinator::Subscribing { subscriber, .. }
                    if Arc::ptr_eq(subscriber, &session.subscriber) =>
                {
                    *inner = Coordinator::Resolved(Arc::clone(&session));
                    true
                }
                _ => false,
            }
        };

        if !published {
            log::info!("[Session] Shut down while establishing, discarding session");
            session.shutdown().await;
            return Err(SonokeyError::Cancelled("subscription"));
        }
        Ok(session)
    }

    /// The active session, if resolved.
    #[must_use]
    pub fn active(&self) -> Option<Arc<ActiveSession>> {
        match &*self.inner.read() {
            Coordinator::Resolved(session) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Routes a key press to the active session.
    pub async fn press(&self, key: RemoteKey) -> SonokeyResult<SessionState> {
        let session = self.active().ok_or(SonokeyError::NotConnected)?;
        Ok(session.press(key).await?)
    }

    /// Routes a NOTIFY. Pushes that arrive before the group is resolved are
    /// dropped.
    pub fn handle_notify(&self, sid: &str, body: &str) -> bool {
        let current = self.inner.read().clone();
        match current {
            Coordinator::Resolved(session) => session.handle_notify(sid, body),
            Coordinator::Subscribing { subscriber, .. } => subscriber.handle_notify(sid, body),
            Coordinator::Unresolved => {
                log::debug!("[Session] NOTIFY {} before resolution, dropped", sid);
                false
            }
        }
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        let current = self.inner.read().clone();
        match current {
            Coordinator::Resolved(session) => SessionView {
                connected: true,
                group: Some(session.group.name.clone()),
                coordinator: Some(session.group.coordinator.clone()),
                state: session.snapshot(),
                subscription: session.subscription_status(),
            },
            Coordinator::Subscribing { group, subscriber } => SessionView {
                connected: false,
                group: Some(group.name),
                coordinator: Some(group.coordinator),
                state: subscriber.state(),
                subscription: subscriber.status(),
            },
            Coordinator::Unresolved => SessionView {
                connected: false,
                group: None,
                coordinator: None,
                state: SessionState::default(),
                subscription: SubscriptionStatus::Unsubscribed,
            },
        }
    }

    /// Takes the session out of the slot and shuts it down.
    pub async fn shutdown(&self) {
        let previous = std::mem::take(&mut *self.inner.write());
        match previous {
            Coordinator::Resolved(session) => session.shutdown().await,
            Coordinator::Subscribing { subscriber, .. } => subscriber.shutdown().await,
            Coordinator::Unresolved => {}
        }
    }
}

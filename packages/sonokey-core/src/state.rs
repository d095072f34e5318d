//! Configuration and the shared session state record.
//!
//! [`SessionStore`] is the single record that command replies and event
//! pushes both write into. Fields are merged independently, last write wins.

use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::sonos::discovery::SsdpConfig;
use crate::sonos::types::PlaybackStatus;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn default_volume_step() -> i32 {
    2
}
fn default_mute_adjustment() -> i32 {
    -200
}
fn default_discovery_timeout_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_subscription_timeout_secs() -> u64 {
    crate::protocol_constants::GENA_SUBSCRIPTION_TIMEOUT_SECS
}
fn default_renewal_buffer_secs() -> u64 {
    crate::protocol_constants::GENA_RENEWAL_BUFFER_SECS
}
fn default_renewal_check_secs() -> u64 {
    crate::protocol_constants::GENA_RENEWAL_CHECK_SECS
}
fn default_resubscribe_delay_secs() -> u64 {
    5
}
fn default_permission_poll_secs() -> u64 {
    3
}
fn default_permission_prompt_secs() -> u64 {
    30
}

/// Session configuration.
///
/// Only `target_group` and `callback_base_url` are required; everything else
/// has a default.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Display name of the group to control, e.g. `"Kitchen + 1"`.
    pub target_group: String,

    /// Base URL devices use to reach our callback server, e.g.
    /// `http://192.168.1.5:8149`.
    pub callback_base_url: String,

    // Keys
    /// Volume change per VolumeUp/VolumeDown press.
    #[serde(default = "default_volume_step")]
    pub volume_step: i32,

    /// Adjustment sent for VolumeMute; large enough to reach silence.
    #[serde(default = "default_mute_adjustment")]
    pub mute_adjustment: i32,

    /// Apply the requested play/pause state locally once the command
    /// succeeds, ahead of the confirming event.
    #[serde(default = "default_true")]
    pub optimistic_transport: bool,

    // Discovery
    /// Collection window for one discovery round (seconds).
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Enable SSDP multicast discovery.
    #[serde(default = "default_true")]
    pub discovery_ssdp_multicast: bool,

    /// Enable SSDP broadcast discovery.
    #[serde(default = "default_true")]
    pub discovery_ssdp_broadcast: bool,

    // Subscriptions
    /// Subscription lifetime requested from the coordinator (seconds).
    #[serde(default = "default_subscription_timeout_secs")]
    pub subscription_timeout_secs: u64,

    /// Renew subscriptions expiring within this many seconds.
    #[serde(default = "default_renewal_buffer_secs")]
    pub renewal_buffer_secs: u64,

    /// Interval between renewal checks (seconds).
    #[serde(default = "default_renewal_check_secs")]
    pub renewal_check_secs: u64,

    /// Delay before re-subscribing after a lost subscription (seconds).
    #[serde(default = "default_resubscribe_delay_secs")]
    pub resubscribe_delay_secs: u64,

    // Permissions
    /// Interval between permission gate polls (seconds).
    #[serde(default = "default_permission_poll_secs")]
    pub permission_poll_secs: u64,

    /// Minimum interval between repeated permission prompts (seconds).
    #[serde(default = "default_permission_prompt_secs")]
    pub permission_prompt_secs: u64,
}

impl Config {
    /// Creates a configuration with defaults for every optional field.
    #[must_use]
    pub fn new(target_group: impl Into<String>, callback_base_url: impl Into<String>) -> Self {
        Self {
            target_group: target_group.into(),
            callback_base_url: callback_base_url.into(),
            volume_step: default_volume_step(),
            mute_adjustment: default_mute_adjustment(),
            optimistic_transport: true,
            discovery_timeout_secs: default_discovery_timeout_secs(),
            discovery_ssdp_multicast: true,
            discovery_ssdp_broadcast: true,
            subscription_timeout_secs: default_subscription_timeout_secs(),
            renewal_buffer_secs: default_renewal_buffer_secs(),
            renewal_check_secs: default_renewal_check_secs(),
            resubscribe_delay_secs: default_resubscribe_delay_secs(),
            permission_poll_secs: default_permission_poll_secs(),
            permission_prompt_secs: default_permission_prompt_secs(),
        }
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_group.trim().is_empty() {
            return Err("target_group is required".to_string());
        }
        if !self.callback_base_url.starts_with("http://") {
            return Err(format!(
                "callback_base_url must start with http:// (got {:?})",
                self.callback_base_url
            ));
        }
        if !(1..=100).contains(&self.volume_step) {
            return Err("volume_step must be between 1 and 100".to_string());
        }
        if self.mute_adjustment >= 0 {
            return Err("mute_adjustment must be negative".to_string());
        }
        if self.discovery_timeout_secs == 0 {
            return Err("discovery_timeout_secs must be >= 1".to_string());
        }
        if !self.discovery_ssdp_multicast && !self.discovery_ssdp_broadcast {
            return Err("at least one discovery method must be enabled".to_string());
        }
        if self.subscription_timeout_secs <= self.renewal_buffer_secs {
            return Err("subscription_timeout_secs must exceed renewal_buffer_secs".to_string());
        }
        if self.renewal_check_secs == 0 || self.permission_poll_secs == 0 {
            return Err("poll intervals must be >= 1 second".to_string());
        }
        Ok(())
    }

    /// SSDP timing for one discovery round.
    #[must_use]
    pub fn ssdp_config(&self) -> SsdpConfig {
        SsdpConfig {
            discovery_timeout: Duration::from_secs(self.discovery_timeout_secs),
            ..SsdpConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of the controlled group's state.
///
/// Both fields start unknown and are filled in as replies and events arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Group volume (0-100).
    pub volume: Option<u8>,
    /// Transport status.
    pub transport: Option<PlaybackStatus>,
}

/// A partial update to [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFragment {
    Volume(u8),
    Transport(PlaybackStatus),
}

/// Where a fragment came from. Only used for logging; every source merges
/// with the same policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    /// Parsed from a command response.
    Command,
    /// Parsed from an event push.
    Event,
    /// Local hint after a successful play/pause.
    Optimistic,
}

impl std::fmt::Display for FragmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Event => write!(f, "event"),
            Self::Optimistic => write!(f, "optimistic"),
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    state: SessionState,
    closed: bool,
}

/// Owner of the session's mutable state.
///
/// Merges are serialized by one lock, so each field always holds the value of
/// the most recent merge. After [`close`](Self::close) every merge is
/// rejected.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fragment into the state.
    ///
    /// Returns the resulting snapshot, or `None` if the store is closed.
    pub fn merge(&self, fragment: StateFragment, source: FragmentSource) -> Option<SessionState> {
        let mut inner = self.inner.write();
        if inner.closed {
            log::debug!("[Session] Dropping {} fragment after teardown: {:?}", source, fragment);
            return None;
        }

        match fragment {
            StateFragment::Volume(volume) => inner.state.volume = Some(volume),
            StateFragment::Transport(status) => inner.state.transport = Some(status),
        }
        log::trace!("[Session] Merged {} fragment {:?}", source, fragment);
        Some(inner.state)
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().state
    }

    /// Returns the current transport status, if known.
    #[must_use]
    pub fn transport(&self) -> Option<PlaybackStatus> {
        self.inner.read().state.transport
    }

    /// Rejects all further merges.
    pub fn close(&self) {
        self.inner.write().closed = true;
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }
}

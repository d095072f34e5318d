//! Events delivered to the presentation sink.
//!
//! This module provides:
//! - [`EventEmitter`] trait the session reports through
//! - [`StateEvent`] for every applied state merge
//! - [`HealthEvent`] for subscription health changes

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

#[cfg(test)]
pub(crate) use emitter::tests::RecordingEventEmitter;

use serde::Serialize;

use crate::protocol_constants::MAX_VOLUME;
use crate::sonos::types::PlaybackStatus;

/// Scales a group volume into `0.0..=1.0` for display.
#[must_use]
pub fn normalize_volume(volume: u8) -> f32 {
    (f32::from(volume) / f32::from(MAX_VOLUME)).clamp(0.0, 1.0)
}

/// State of the push subscription on the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionStatus {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
    /// The push channel broke; a new attempt is scheduled.
    Failed,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsubscribed => write!(f, "unsubscribed"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A session state field changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StateEvent {
    /// Group volume was merged.
    VolumeChanged {
        /// Absolute group volume (0-100).
        volume: u8,
        /// `volume / 100`, clamped to `0.0..=1.0`.
        normalized: f32,
    },
    /// Transport status was merged.
    TransportChanged { status: PlaybackStatus },
}

impl StateEvent {
    /// Builds a volume event with its normalized value filled in.
    #[must_use]
    pub fn volume(volume: u8) -> Self {
        Self::VolumeChanged {
            volume,
            normalized: normalize_volume(volume),
        }
    }
}

/// Non-fatal session health signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HealthEvent {
    /// The push subscription changed state.
    Subscription {
        status: SubscriptionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

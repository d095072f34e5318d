//! One-shot control actions against the group coordinator.
//!
//! Each action is a single request/response exchange. Nothing is retried; the
//! caller decides whether to re-issue a failed action.

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::sonos::soap::SoapError;
use crate::sonos::traits::SonosCommands;
use crate::sonos::types::{CoordinatorEndpoint, PlaybackStatus};
use crate::state::StateFragment;

/// A control action on the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "delta", rename_all = "camelCase")]
pub enum Action {
    /// Change the group volume by a signed delta.
    AdjustVolume(i32),
    /// Zero adjustment, used to read the volume back.
    LoadVolume,
    Play,
    Pause,
    Next,
    Previous,
}

impl Action {
    /// Transport status to assume once this action has succeeded.
    ///
    /// Only a hint; the next AVTransport event is authoritative.
    #[must_use]
    pub fn optimistic_status(self) -> Option<PlaybackStatus> {
        match self {
            Self::Play => Some(PlaybackStatus::Playing),
            Self::Pause => Some(PlaybackStatus::Paused),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdjustVolume(delta) => write!(f, "AdjustVolume({:+})", delta),
            Self::LoadVolume => write!(f, "LoadVolume"),
            Self::Play => write!(f, "Play"),
            Self::Pause => write!(f, "Pause"),
            Self::Next => write!(f, "Next"),
            Self::Previous => write!(f, "Previous"),
        }
    }
}

/// A single action failed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The exchange failed or its response was unusable.
    #[error("{action} failed: {source}")]
    Failed {
        action: Action,
        #[source]
        source: SoapError,
    },

    /// Session teardown interrupted the exchange.
    #[error("{action} cancelled")]
    Cancelled { action: Action },
}

impl CommandError {
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Failed { action, .. } | Self::Cancelled { action } => *action,
        }
    }
}

/// Convenient Result alias for command dispatch.
pub type CommandResult<T> = Result<T, CommandError>;

/// Executes `action` on `coordinator`.
///
/// Volume actions return the new absolute volume as a fragment; transport
/// actions return `None`. The exchange is abandoned if `cancel` fires.
pub async fn execute(
    commands: &dyn SonosCommands,
    action: Action,
    coordinator: &CoordinatorEndpoint,
    cancel: &CancellationToken,
) -> CommandResult<Option<StateFragment>> {
    log::debug!("[Command] {} -> {}", action, coordinator);

    let exchange = async {
        match action {
            Action::AdjustVolume(delta) => commands
                .set_relative_group_volume(coordinator, delta)
                .await
                .map(|volume| Some(StateFragment::Volume(volume))),
            Action::LoadVolume => commands
                .set_relative_group_volume(coordinator, 0)
                .await
                .map(|volume| Some(StateFragment::Volume(volume))),
            Action::Play => commands.play(coordinator).await.map(|()| None),
            Action::Pause => commands.pause(coordinator).await.map(|()| None),
            Action::Next => commands.next(coordinator).await.map(|()| None),
            Action::Previous => commands.previous(coordinator).await.map(|()| None),
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CommandError::Cancelled { action }),
        result = exchange => result,
    };

    match result {
        Ok(fragment) => {
            log::debug!("[Command] {} ok: {:?}", action, fragment);
            Ok(fragment)
        }
        Err(source) => {
            log::warn!("[Command] {} failed: {}", action, source);
            Err(CommandError::Failed { action, source })
        }
    }
}

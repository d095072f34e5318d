//! Remote key presses and their mapping onto group actions.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::services::command_dispatcher::Action;
use crate::sonos::types::PlaybackStatus;
use crate::state::Config;

/// A media key the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteKey {
    PlayPause,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    /// Reads the current volume without changing it.
    LoadVolume,
    PreviousSong,
    NextSong,
}

/// The key name was not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key {0:?}")]
pub struct InvalidKeyError(pub String);

impl FromStr for RemoteKey {
    type Err = InvalidKeyError;

    /// Parses `play_pause`, `volume-up`, `MUTE` and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "play_pause" | "playpause" => Ok(Self::PlayPause),
            "volume_up" | "volumeup" => Ok(Self::VolumeUp),
            "volume_down" | "volumedown" => Ok(Self::VolumeDown),
            "mute" | "volume_mute" | "volumemute" => Ok(Self::VolumeMute),
            "load_volume" | "loadvolume" => Ok(Self::LoadVolume),
            "previous" | "previous_song" | "prev" => Ok(Self::PreviousSong),
            "next" | "next_song" => Ok(Self::NextSong),
            _ => Err(InvalidKeyError(s.to_string())),
        }
    }
}

impl std::fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PlayPause => "play_pause",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::VolumeMute => "volume_mute",
            Self::LoadVolume => "load_volume",
            Self::PreviousSong => "previous_song",
            Self::NextSong => "next_song",
        };
        f.write_str(name)
    }
}

impl RemoteKey {
    /// Maps the key onto an action.
    ///
    /// PlayPause pauses only when the group is known to be playing; an
    /// unknown transport state starts playback.
    #[must_use]
    pub fn action(self, config: &Config, transport: Option<PlaybackStatus>) -> Action {
        match self {
            Self::VolumeUp => Action::AdjustVolume(config.volume_step),
            Self::VolumeDown => Action::AdjustVolume(-config.volume_step),
            Self::VolumeMute => Action::AdjustVolume(config.mute_adjustment),
            Self::LoadVolume => Action::LoadVolume,
            Self::PlayPause => match transport {
                Some(PlaybackStatus::Playing) => Action::Pause,
                _ => Action::Play,
            },
            Self::PreviousSong => Action::Previous,
            Self::NextSong => Action::Next,
        }
    }
}

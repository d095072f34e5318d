//! Daemon configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Daemon configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Port for the callback server.
    /// Override: `SONOKEY_BIND_PORT`
    pub bind_port: u16,

    /// Display name of the group to control.
    /// Override: `SONOKEY_TARGET_GROUP`
    pub target_group: Option<String>,

    /// Base URL devices use to reach the callback server.
    /// If not specified, it is derived from the local IP and `bind_port`.
    /// Override: `SONOKEY_CALLBACK_URL`
    pub callback_url: Option<String>,

    /// Volume change per key press.
    /// Override: `SONOKEY_VOLUME_STEP`
    pub volume_step: i32,

    /// Adjustment sent for the mute key.
    pub mute_adjustment: i32,

    /// Assume the requested play/pause state once the command succeeds.
    pub optimistic_transport: bool,

    /// Discovery window in seconds.
    pub discovery_timeout_secs: u64,

    /// Enable SSDP multicast discovery.
    pub discovery_ssdp_multicast: bool,

    /// Enable SSDP broadcast discovery.
    pub discovery_ssdp_broadcast: bool,

    /// Requested subscription lifetime in seconds.
    pub subscription_timeout_secs: u64,

    /// Delay before re-subscribing after a failure, in seconds.
    pub resubscribe_delay_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let core = sonokey_core::Config::new("", "");
        Self {
            bind_port: 8149,
            target_group: None,
            callback_url: None,
            volume_step: core.volume_step,
            mute_adjustment: core.mute_adjustment,
            optimistic_transport: core.optimistic_transport,
            discovery_timeout_secs: core.discovery_timeout_secs,
            discovery_ssdp_multicast: core.discovery_ssdp_multicast,
            discovery_ssdp_broadcast: core.discovery_ssdp_broadcast,
            subscription_timeout_secs: core.subscription_timeout_secs,
            resubscribe_delay_secs: core.resubscribe_delay_secs,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("SONOKEY_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(group) = lookup("SONOKEY_TARGET_GROUP").filter(|v| !v.trim().is_empty()) {
            self.target_group = Some(group);
        }

        if let Some(url) = lookup("SONOKEY_CALLBACK_URL").filter(|v| !v.trim().is_empty()) {
            self.callback_url = Some(url);
        }

        if let Some(step) = lookup("SONOKEY_VOLUME_STEP").and_then(|v| v.parse().ok()) {
            self.volume_step = step;
        }
    }

    /// Converts to sonokey-core's Config type.
    pub fn to_core_config(&self, callback_base_url: &str) -> Result<sonokey_core::Config> {
        let target_group = self
            .target_group
            .as_deref()
            .context("No target group configured. Set target_group, --group or SONOKEY_TARGET_GROUP")?;

        Ok(sonokey_core::Config {
            volume_step: self.volume_step,
            mute_adjustment: self.mute_adjustment,
            optimistic_transport: self.optimistic_transport,
            discovery_timeout_secs: self.discovery_timeout_secs,
            discovery_ssdp_multicast: self.discovery_ssdp_multicast,
            discovery_ssdp_broadcast: self.discovery_ssdp_broadcast,
            subscription_timeout_secs: self.subscription_timeout_secs,
            resubscribe_delay_secs: self.resubscribe_delay_secs,
            ..sonokey_core::Config::new(target_group, callback_base_url)
        })
    }
}

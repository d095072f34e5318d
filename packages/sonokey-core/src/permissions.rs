//! Readiness gate checked before discovery starts.
//!
//! The host environment decides whether we may touch the local network and
//! read media keys. Until it says yes, the session waits and periodically
//! reminds the operator.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::sonos::discovery::ssdp::get_interfaces;

/// Errors raised while waiting for the gate.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Teardown happened before the gate opened.
    #[error("cancelled while waiting for permissions")]
    Cancelled,
}

/// Convenient Result alias for permission checks.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// External readiness signal.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Returns `true` once every required permission is granted.
    async fn check(&self) -> bool;

    /// Operator-facing hint logged while the gate is closed.
    fn prompt(&self) -> &str {
        "Waiting for local network and input monitoring permissions"
    }
}

/// Gate that is always open.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn check(&self) -> bool {
        true
    }
}

/// Opens once a usable IPv4 interface exists.
///
/// Loopback and virtual adapters do not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkInterfaceGate;

#[async_trait]
impl PermissionGate for NetworkInterfaceGate {
    async fn check(&self) -> bool {
        !get_interfaces().is_empty()
    }

    fn prompt(&self) -> &str {
        "No usable network interface; connect to the speakers' network"
    }
}

/// Polls `gate` until it opens.
///
/// The prompt is logged on the first closed check and then at most once per
/// `prompt_interval`.
///
/// # Errors
///
/// Returns `PermissionError::Cancelled` if `cancel` fires first.
pub async fn wait_for_permissions(
    gate: &dyn PermissionGate,
    poll_interval: Duration,
    prompt_interval: Duration,
    cancel: &CancellationToken,
) -> PermissionResult<()> {
    let mut last_prompt: Option<Instant> = None;
    let mut prompts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(PermissionError::Cancelled);
        }

        if gate.check().await {
            if prompts > 0 {
                log::info!("[Permissions] Granted");
            }
            return Ok(());
        }

        let now = Instant::now();
        if last_prompt.map_or(true, |at| now.duration_since(at) >= prompt_interval) {
            log::warn!("[Permissions] {}", gate.prompt());
            last_prompt = Some(now);
            prompts += 1;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PermissionError::Cancelled),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

//! Terminal stand-in for an on-screen display.

use sonokey_core::{EventEmitter, HealthEvent, StateEvent, SubscriptionStatus};

const BAR_WIDTH: usize = 20;

/// Renders state changes as one log line each.
pub struct OsdEmitter;

impl EventEmitter for OsdEmitter {
    fn emit_state(&self, event: StateEvent) {
        log::info!("[OSD] {}", render_state(&event));
    }

    fn emit_health(&self, event: HealthEvent) {
        let HealthEvent::Subscription { status, reason } = event;
        match (status, reason) {
            (SubscriptionStatus::Failed, Some(reason)) => {
                log::warn!("[OSD] Live updates unavailable: {}", reason);
            }
            (SubscriptionStatus::Failed, None) => log::warn!("[OSD] Live updates unavailable"),
            (SubscriptionStatus::Subscribed, _) => log::info!("[OSD] Live updates active"),
            _ => {}
        }
    }
}

/// Formats a state change for display. Volume 0 shows the muted
/// speaker with a blank bar instead of an empty volume level.
fn render_state(event: &StateEvent) -> String {
    match event {
        StateEvent::VolumeChanged { volume: 0, .. } => {
            format!("Muted {}", volume_bar(0.0))
        }
        StateEvent::VolumeChanged { volume, normalized } => {
            format!("Volume {} {:>3}", volume_bar(*normalized), volume)
        }
        StateEvent::TransportChanged { status } => status.to_string(),
    }
}

fn volume_bar(normalized: f32) -> String {
    let filled = (normalized.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

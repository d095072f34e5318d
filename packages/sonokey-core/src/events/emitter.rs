//! Event emitter abstraction for decoupling the session from its display.
//!
//! The session depends on the [`EventEmitter`] trait rather than on a
//! concrete on-screen display, so tests and headless runs can swap it out.

use super::{HealthEvent, StateEvent};

/// Receives session events without knowing how they are presented.
///
/// Called synchronously from the merge path; implementations must not block.
///
/// # Example
///
/// ```ignore
/// struct Osd;
///
/// impl EventEmitter for Osd {
///     fn emit_state(&self, event: StateEvent) {
///         if let StateEvent::VolumeChanged { normalized, .. } = event {
///             show_volume_bar(normalized);
///         }
///     }
///     fn emit_health(&self, _event: HealthEvent) {}
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a state change after a merge was applied.
    fn emit_state(&self, event: StateEvent);

    /// Emits a subscription health change.
    fn emit_health(&self, event: HealthEvent);
}

/// Discards every event.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_state(&self, _event: StateEvent) {}

    fn emit_health(&self, _event: HealthEvent) {}
}

/// Logs every event at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_state(&self, event: StateEvent) {
        tracing::debug!(?event, "state_event");
    }

    fn emit_health(&self, event: HealthEvent) {
        tracing::debug!(?event, "health_event");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Test emitter that records events.
    #[derive(Default)]
    pub(crate) struct RecordingEventEmitter {
        pub states: Mutex<Vec<StateEvent>>,
        pub health: Mutex<Vec<HealthEvent>>,
    }

    impl EventEmitter for RecordingEventEmitter {
        fn emit_state(&self, event: StateEvent) {
            self.states.lock().push(event);
        }

        fn emit_health(&self, event: HealthEvent) {
            self.health.lock().push(event);
        }
    }

    #[test]
    fn recording_emitter_keeps_order() {
        let emitter = RecordingEventEmitter::default();
        emitter.emit_state(StateEvent::volume(10));
        emitter.emit_state(StateEvent::volume(12));

        assert_eq!(
            *emitter.states.lock(),
            vec![StateEvent::volume(10), StateEvent::volume(12)]
        );
        assert!(emitter.health.lock().is_empty());
    }
}

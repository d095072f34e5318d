//! The session state plus the emitter that announces its changes.
//!
//! Shared by the session (command results) and the subscriber (pushes), so
//! pushes are merged from the moment the first SUBSCRIBE is sent, before the
//! session itself exists.

use std::sync::Arc;

use crate::events::{EventEmitter, StateEvent};
use crate::sonos::gena::ParsedNotify;
use crate::sonos::types::PlaybackStatus;
use crate::state::{FragmentSource, SessionState, SessionStore, StateFragment};

pub struct StateSink {
    store: SessionStore,
    emitter: Arc<dyn EventEmitter>,
}

impl StateSink {
    #[must_use]
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            store: SessionStore::new(),
            emitter,
        }
    }

    /// Merges one fragment and emits the change.
    ///
    /// Returns `false` once the sink is closed.
    pub fn apply(&self, fragment: StateFragment, source: FragmentSource) -> bool {
        if self.store.merge(fragment, source).is_none() {
            return false;
        }
        let event = match fragment {
            StateFragment::Volume(volume) => StateEvent::volume(volume),
            StateFragment::Transport(status) => StateEvent::TransportChanged { status },
        };
        self.emitter.emit_state(event);
        true
    }

    /// Merges every fragment of a routed NOTIFY.
    pub fn apply_notify(&self, notify: ParsedNotify) {
        for fragment in notify.fragments {
            self.apply(fragment, FragmentSource::Event);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    #[must_use]
    pub fn transport(&self) -> Option<PlaybackStatus> {
        self.store.transport()
    }

    /// Drops every later fragment.
    pub fn close(&self) {
        self.store.close();
    }
}

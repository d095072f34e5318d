//! Application services layer.
//!
//! Orchestrates the `sonos` infrastructure into one control session:
//! resolve the group, dispatch commands, keep the push subscription alive.

pub mod command_dispatcher;
pub mod event_subscriber;
pub mod session;
pub mod state_sink;
pub mod topology_resolver;

pub use command_dispatcher::{Action, CommandError, CommandResult};
pub use event_subscriber::EventSubscriber;
pub use session::{ActiveSession, Coordinator, SessionHandle, SessionView};
pub use topology_resolver::{GroupNotFoundError, ResolveError, ResolvedGroup};

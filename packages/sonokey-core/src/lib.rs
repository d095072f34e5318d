//! Sonokey Core - media-key control of a single Sonos group.
//!
//! The crate discovers Sonos devices on the LAN, resolves a named group to its
//! coordinator, sends one-shot transport and volume commands, and keeps a
//! session state current from the coordinator's GENA event pushes.
//!
//! # Architecture
//!
//! - [`sonos`]: UPnP plumbing (SSDP discovery, SOAP, GENA, topology parsing)
//! - [`services`]: the control session built on top of it
//! - [`state`]: configuration and the session state store
//! - [`events`]: state and health notifications for the presentation layer
//! - [`keys`]: media keys and their mapping to actions
//! - [`api`]: GENA callback endpoint and local HTTP API
//! - [`error`]: crate-level error type
//!
//! # Abstraction Traits
//!
//! - [`SonosClient`](sonos::SonosClient): every network operation on devices
//! - [`EventEmitter`](events::EventEmitter): state and health notifications
//! - [`PermissionGate`](permissions::PermissionGate): network access check
//! - [`IpDetector`](context::IpDetector): local IP detection

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod context;
pub mod error;
pub mod events;
pub mod keys;
pub mod permissions;
pub mod protocol_constants;
pub mod services;
pub mod sonos;
pub mod state;

pub use context::{IpDetector, LocalIpDetector, NetworkError, UrlBuilder};
pub use error::{ErrorCode, SonokeyError, SonokeyResult};
pub use events::{
    EventEmitter, HealthEvent, LoggingEventEmitter, NoopEventEmitter, StateEvent,
    SubscriptionStatus,
};
pub use keys::{InvalidKeyError, RemoteKey};
pub use permissions::{AlwaysGranted, NetworkInterfaceGate, PermissionGate};
pub use state::{Config, SessionState};

// Re-export Sonos types
pub use sonos::discovery::DeviceRecord;
pub use sonos::{CoordinatorEndpoint, PlaybackStatus, SonosClient, SonosClientImpl, ZoneGroup};

// Re-export service types
pub use services::{Action, ActiveSession, SessionHandle, SessionView};

// Re-export API types
pub use api::{bind, start_server, AppState, ServerError};

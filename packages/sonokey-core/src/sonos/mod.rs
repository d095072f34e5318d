//! Sonos device discovery, control and eventing.
//!
//! # Module Structure
//!
//! - `types` - Endpoints, zone groups and transport states
//! - `services` - UPnP service definitions (URNs, paths)
//! - `traits` - Trait abstractions for testability
//! - `client` - `SonosClientImpl` concrete trait implementation
//! - `discovery` - SSDP multicast/broadcast discovery
//! - `zone_groups` - Zone group topology parsing and retrieval
//! - `playback` - Play, pause and track skip
//! - `volume` - Relative group volume
//! - `gena` - GENA subscription lifecycle
//! - `gena_client` - GENA HTTP operations
//! - `gena_store` - GENA subscription bookkeeping
//! - `gena_parser` - NOTIFY body parsing
//! - `soap` - Low-level SOAP protocol implementation
//! - `utils` - Shared XML and URL helpers

pub mod client;
pub mod discovery;
pub mod gena;
pub mod gena_client;
pub mod gena_parser;
pub mod gena_store;
pub(crate) mod playback;
pub mod services;
pub mod soap;
pub mod traits;
pub mod types;
pub mod utils;
pub(crate) mod volume;
pub mod zone_groups;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use services::SonosService;
pub use traits::{
    SonosClient, SonosCommands, SonosDiscovery, SonosEventing, SonosPlayback, SonosTopology,
    SonosVolumeControl,
};
pub use types::{CoordinatorEndpoint, HostEndpoint, PlaybackStatus, ZoneGroup, ZoneGroupMember};

pub use client::SonosClientImpl;

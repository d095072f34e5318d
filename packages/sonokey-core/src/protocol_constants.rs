//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, SSDP, GENA)
//! or by the Sonos firmware, and changing them would break protocol compliance.
//! Tunable values live in [`Config`](crate::state::Config).

// ─────────────────────────────────────────────────────────────────────────────
// SSDP
// ─────────────────────────────────────────────────────────────────────────────

/// Standard SSDP multicast address and port.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Limited broadcast address used as a fallback when multicast is filtered.
pub const SSDP_LIMITED_BROADCAST_ADDR: &str = "255.255.255.255:1900";

/// SSDP search target for Sonos ZonePlayer devices.
pub const SONOS_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// Port of the HTTP control server on every Sonos device.
pub const SONOS_PORT: u16 = 1400;

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// GENA subscription timeout requested from the coordinator (seconds).
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 3600;

/// Time before subscription expiry to trigger renewal (seconds).
pub const GENA_RENEWAL_BUFFER_SECS: u64 = 300;

/// Interval between subscription renewal checks (seconds).
pub const GENA_RENEWAL_CHECK_SECS: u64 = 60;

/// Timeout for a single SUBSCRIBE/renew/UNSUBSCRIBE exchange (seconds).
pub const GENA_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Path on our HTTP server that receives NOTIFY requests.
pub const GENA_CALLBACK_PATH: &str = "/sonos/gena";

/// Maximum size of GENA notification body (bytes).
pub const MAX_GENA_BODY_SIZE: usize = 64 * 1024;

/// How long a NOTIFY for a not-yet-known SID is held while a SUBSCRIBE is
/// in flight (seconds). Devices send the initial NOTIFY right after the
/// SUBSCRIBE response, so it can arrive first.
pub const GENA_EARLY_NOTIFY_GRACE_SECS: u64 = 5;

/// Maximum number of held early NOTIFYs.
pub const MAX_GENA_EARLY_NOTIFIES: usize = 16;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for SOAP HTTP requests (seconds).
///
/// 10 seconds is reasonable for LAN operations.
pub const SOAP_TIMEOUT_SECS: u64 = 10;

/// Upper bound of a Sonos group volume. The device clamps relative
/// adjustments into `0..=MAX_VOLUME`.
pub const MAX_VOLUME: u8 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier returned by the `/health` endpoint.
pub const SERVICE_ID: &str = "sonokey";

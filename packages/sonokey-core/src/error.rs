//! Crate-wide error type for session establishment and the local API.
//!
//! This module provides:
//! - [`ErrorCode`] for stable, machine-readable codes on module errors
//! - [`SonokeyError`], which names the stage that failed
//! - `IntoResponse` for JSON error bodies

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::context::NetworkError;
use crate::keys::InvalidKeyError;
use crate::permissions::PermissionError;
use crate::services::command_dispatcher::CommandError;
use crate::services::topology_resolver::{GroupNotFoundError, ResolveError};
use crate::sonos::discovery::DiscoveryError;
use crate::sonos::soap::SoapError;
use crate::sonos::zone_groups::TopologyError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::SendSearch(_) => "ssdp_send_failed",
            Self::NoInterfaces => "no_network_interfaces",
            Self::NoMethodsEnabled => "no_discovery_methods",
            Self::AllMethodsFailed(_) => "all_discovery_methods_failed",
            Self::Cancelled => "discovery_cancelled",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault(_) => "soap_fault",
            Self::Parse(_) => "soap_parse_error",
            Self::Incomplete(_) => "soap_request_incomplete",
        }
    }
}

impl ErrorCode for TopologyError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoDevices => "no_devices",
            Self::Soap(e) => e.code(),
            Self::MissingZoneGroupState => "missing_zone_group_state",
            Self::Xml(_) => "malformed_topology",
            Self::MissingAttribute { .. } => "topology_missing_attribute",
            Self::MissingHost { .. } => "topology_missing_host",
            Self::CoordinatorNotMember { .. } => "coordinator_not_member",
        }
    }
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed { source, .. } => source.code(),
            Self::Cancelled { .. } => "command_cancelled",
        }
    }
}

/// Failure of session establishment or of an API request.
#[derive(Debug, Error)]
pub enum SonokeyError {
    /// Configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The search could not be run.
    #[error("Discovery failed: {0}")]
    Discovery(DiscoveryError),

    /// The search ran but nothing answered.
    #[error("Discovery found no devices")]
    NoDevices,

    /// Topology payload could not be fetched or was malformed.
    #[error("Topology resolution failed: {0}")]
    Topology(#[from] TopologyError),

    /// Configured group is absent.
    #[error("Group match failed: {0}")]
    GroupNotFound(#[from] GroupNotFoundError),

    /// One command exchange failed.
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),

    /// A key press arrived before the coordinator was resolved.
    #[error("Not connected to a group yet")]
    NotConnected,

    /// Malformed request to the local API.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unrecognised key name.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKeyError),

    /// Teardown interrupted the named stage.
    #[error("Cancelled during {0}")]
    Cancelled(&'static str),
}

impl SonokeyError {
    /// The stage that failed, for operator-facing messages.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Discovery(_) | Self::NoDevices => "discovery",
            Self::Topology(_) => "topology",
            Self::GroupNotFound(_) => "group match",
            Self::Command(_) => "command",
            Self::NotConnected | Self::InvalidRequest(_) | Self::InvalidKey(_) => "request",
            Self::Cancelled(stage) => *stage,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "invalid_configuration",
            Self::Discovery(e) => e.code(),
            Self::NoDevices => "no_devices",
            Self::Topology(e) => e.code(),
            Self::GroupNotFound(_) => "group_not_found",
            Self::Command(e) => e.code(),
            Self::NotConnected => "not_connected",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidKey(_) => "invalid_key",
            Self::Cancelled(_) => "cancelled",
        }
    }

    /// Whether retrying the same operation cannot help without operator action.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::GroupNotFound(_))
    }

    /// Maps the error to an appropriate HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConnected => StatusCode::CONFLICT,
            Self::InvalidRequest(_) | Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::GroupNotFound(_) => StatusCode::NOT_FOUND,
            Self::Command(CommandError::Cancelled { .. }) | Self::Cancelled(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Command(_) | Self::Discovery(_) | Self::NoDevices | Self::Topology(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for crate-level operations.
pub type SonokeyResult<T> = Result<T, SonokeyError>;

impl From<DiscoveryError> for SonokeyError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Cancelled => Self::Cancelled("discovery"),
            other => Self::Discovery(other),
        }
    }
}

impl From<ResolveError> for SonokeyError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Topology(e) => Self::Topology(e),
            ResolveError::GroupNotFound(e) => Self::GroupNotFound(e),
        }
    }
}

impl From<PermissionError> for SonokeyError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Cancelled => Self::Cancelled("permissions"),
        }
    }
}

impl From<NetworkError> for SonokeyError {
    fn from(err: NetworkError) -> Self {
        Self::Config(err.to_string())
    }
}

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for SonokeyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

//! Callback address resolution.
//!
//! Devices push events to an HTTP endpoint on this host. The base URL is
//! either configured explicitly or derived from the detected local IP and the
//! bound port.

use crate::protocol_constants::GENA_CALLBACK_PATH;

/// Trait for detecting the local IP address.
///
/// Allows tests to inject a fixed address.
pub trait IpDetector: Send + Sync {
    /// Detects the local IP address.
    fn detect(&self) -> Result<String, NetworkError>;
}

/// Default IP detector using the system's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<String, NetworkError> {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Errors that can occur while resolving the callback address.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect local IP address.
    #[error("Failed to detect local IP: {0}")]
    Detection(String),

    /// The configured base URL is unusable.
    #[error("Invalid callback base URL {0:?}")]
    InvalidBaseUrl(String),
}

/// Builds the URLs devices use to reach this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    /// Creates a builder for `http://<ip>:<port>`.
    pub fn new(ip: impl AsRef<str>, port: u16) -> Self {
        Self {
            base: format!("http://{}:{}", ip.as_ref(), port),
        }
    }

    /// Creates a builder from an explicit base URL, e.g.
    /// `http://192.168.1.5:8149`. A trailing slash is dropped.
    pub fn from_base(base_url: &str) -> Result<Self, NetworkError> {
        let base = base_url.trim().trim_end_matches('/');
        match base.strip_prefix("http://") {
            Some(authority) if !authority.is_empty() && !authority.contains('/') => Ok(Self {
                base: base.to_string(),
            }),
            _ => Err(NetworkError::InvalidBaseUrl(base_url.to_string())),
        }
    }

    /// Creates a builder for the detected local IP and `port`.
    pub fn detect(detector: &dyn IpDetector, port: u16) -> Result<Self, NetworkError> {
        Ok(Self::new(detector.detect()?, port))
    }

    /// Returns the base URL (e.g., `http://192.168.1.100:8149`).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Returns the GENA callback URL for receiving NOTIFY requests.
    #[must_use]
    pub fn gena_callback_url(&self) -> String {
        format!("{}{}", self.base, GENA_CALLBACK_PATH)
    }
}

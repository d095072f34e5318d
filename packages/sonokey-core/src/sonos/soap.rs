//! Low-level SOAP protocol implementation for UPnP/Sonos communication.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and fault detection. Typed commands live in `playback`, `volume` and
//! `zone_groups`.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use super::services::SonosService;
use super::types::HostEndpoint;
use super::utils::{escape_xml, extract_xml_text};
use crate::protocol_constants::SOAP_TIMEOUT_SECS;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with Sonos speakers.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the speaker failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker returned a SOAP fault response.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// The response body did not contain the expected value.
    #[error("Failed to parse SOAP response: missing or invalid {0}")]
    Parse(&'static str),

    /// The request builder was used without a service or action.
    #[error("Incomplete SOAP request: {0} not set")]
    Incomplete(&'static str),
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the SOAP envelope for an action.
///
/// The envelope must be a single line with no leading whitespace; Sonos
/// rejects XML with whitespace before the root element.
fn build_envelope(service_urn: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action, service_urn
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!(r#"</u:{}></s:Body></s:Envelope>"#, action));
    body
}

/// Sends a SOAP request to a Sonos device.
///
/// This is the core transport function for all UPnP SOAP operations. It is a
/// single request/response exchange: no retries are attempted here.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `host` - Control server of the target device
/// * `service` - The UPnP service (provides control path and URN)
/// * `action` - The SOAP action name (e.g., "Play", "SetRelativeGroupVolume")
/// * `args` - Key-value pairs for action arguments (order is preserved)
pub async fn send_soap_request(
    client: &Client,
    host: &HostEndpoint,
    service: SonosService,
    action: &str,
    args: &[(&str, &str)],
) -> SoapResult<String> {
    let url = host.url(service.control_path());
    let body = build_envelope(service.urn(), action, args);

    log::info!("[SOAP] {} -> {} (body: {} bytes)", action, url, body.len());
    log::debug!("[SOAP] Request body: {}", body);

    let start = std::time::Instant::now();
    let res = client
        .post(&url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{}#{}\"", service.urn(), action))
        .body(body)
        .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
        .send()
        .await;

    log::info!(
        "[SOAP] {} completed in {:?}: {:?}",
        action,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let response_text = res.text().await?;

    // SOAP faults usually arrive with a 500 status, so check them first
    if response_text.contains("<s:Fault>") || response_text.contains("<soap:Fault>") {
        let fault_msg = extract_fault_string(&response_text)
            .unwrap_or_else(|| "Unknown SOAP fault".to_string());
        return Err(SoapError::Fault(fault_msg));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

/// Extracts the fault description from a SOAP fault response.
///
/// Prefers the UPnP `errorCode` detail when present, falling back to
/// `faultstring`.
fn extract_fault_string(xml: &str) -> Option<String> {
    let fault = extract_xml_text(xml, "faultstring");
    match (fault, extract_xml_text(xml, "errorCode")) {
        (Some(f), Some(code)) => Some(format!("{} (UPnP error {})", f, code)),
        (Some(f), None) => Some(f),
        (None, Some(code)) => Some(format!("UPnP error {}", code)),
        (None, None) => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests to Sonos devices.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, coordinator.host())
///     .service(SonosService::AVTransport)
///     .action("Play")
///     .instance_id()
///     .arg("Speed", "1")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    host: &'a HostEndpoint,
    service: Option<SonosService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder targeting `host`.
    #[must_use]
    pub fn new(client: &'a Client, host: &'a HostEndpoint) -> Self {
        Self {
            client,
            host,
            service: None,
            action: None,
            args: Vec::new(),
        }
    }

    /// Sets the Sonos service for this request.
    #[must_use]
    pub fn service(mut self, service: SonosService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by most Sonos actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sends the SOAP request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError::Incomplete` if the service or action is not set, or
    /// the transport error if the exchange fails.
    pub async fn send(self) -> SoapResult<String> {
        let service = self.service.ok_or(SoapError::Incomplete("service"))?;
        let action = self.action.ok_or(SoapError::Incomplete("action"))?;

        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        send_soap_request(self.client, self.host, service, action, &args).await
    }

    /// Returns the request parts without sending (for testing).
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(SonosService, &'a str, Vec<(&'a str, String)>)> {
        let service = self.service?;
        let action = self.action?;
        Some((service, action, self.args))
    }
}

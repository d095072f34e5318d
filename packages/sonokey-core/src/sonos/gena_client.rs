//! GENA HTTP client for subscription operations.
//!
//! Handles only the HTTP side of SUBSCRIBE, renewal and UNSUBSCRIBE.
//! Subscription state lives in `GenaSubscriptionStore`.

use std::time::Duration;

use reqwest::{Client, Method, Response};

use super::gena::{GenaError, GenaResult};
use super::services::SonosService;
use super::types::HostEndpoint;
use crate::protocol_constants::GENA_REQUEST_TIMEOUT_SECS;

/// Response from a successful SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// Subscription ID assigned by the device.
    pub sid: String,
    /// Granted timeout in seconds.
    pub timeout_secs: u64,
}

fn gena_method(name: &'static str) -> GenaResult<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|_| GenaError::InvalidMethod(name))
}

fn event_url(host: &HostEndpoint, service: SonosService) -> GenaResult<String> {
    service
        .event_path()
        .map(|path| host.url(path))
        .ok_or(GenaError::NotEvented(service))
}

/// Formats the TIMEOUT header value.
pub(crate) fn timeout_header(timeout_secs: u64) -> String {
    format!("Second-{}", timeout_secs)
}

/// Parses a `Second-N` TIMEOUT header value.
///
/// `Second-infinite` and malformed values fall back to `requested`.
pub(crate) fn parse_timeout_header(value: Option<&str>, requested: u64) -> u64 {
    value
        .map(str::trim)
        .and_then(|v| v.strip_prefix("Second-"))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(requested)
}

/// HTTP client for GENA (UPnP eventing) requests.
#[derive(Clone)]
pub struct GenaClient {
    client: Client,
    request_timeout: Duration,
}

impl GenaClient {
    /// Creates a client with the standard 10 s exchange timeout.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            request_timeout: Duration::from_secs(GENA_REQUEST_TIMEOUT_SECS),
        }
    }

    fn granted_timeout(response: &Response, requested: u64) -> u64 {
        parse_timeout_header(
            response
                .headers()
                .get("TIMEOUT")
                .and_then(|v| v.to_str().ok()),
            requested,
        )
    }

    /// Creates a new subscription.
    ///
    /// # Arguments
    /// * `host` - Device to subscribe on
    /// * `service` - Evented service
    /// * `callback_url` - Where the device should send NOTIFY requests
    /// * `timeout_secs` - Requested subscription lifetime
    pub async fn subscribe(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        callback_url: &str,
        timeout_secs: u64,
    ) -> GenaResult<SubscribeResponse> {
        let url = event_url(host, service)?;
        log::debug!("[GENA] SUBSCRIBE {} -> {}", url, callback_url);

        let response = self
            .client
            .request(gena_method("SUBSCRIBE")?, &url)
            .header("CALLBACK", format!("<{}>", callback_url))
            .header("NT", "upnp:event")
            .header("TIMEOUT", timeout_header(timeout_secs))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::SubscriptionFailed(response.status().as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(GenaError::MissingSid)?;

        Ok(SubscribeResponse {
            sid,
            timeout_secs: Self::granted_timeout(&response, timeout_secs),
        })
    }

    /// Renews an existing subscription and returns the granted timeout.
    pub async fn renew(
        &self,
        host: &HostEndpoint,
        service: SonosService,
        sid: &str,
        timeout_secs: u64,
    ) -> GenaResult<u64> {
        let url = event_url(host, service)?;

        let response = self
            .client
            .request(gena_method("SUBSCRIBE")?, &url)
            .header("SID", sid)
            .header("TIMEOUT", timeout_header(timeout_secs))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::RenewalFailed(response.status().as_u16()));
        }

        Ok(Self::granted_timeout(&response, timeout_secs))
    }

    /// Cancels a subscription.
    ///
    /// Returns `false` if the request failed; the caller drops the local
    /// subscription either way.
    pub async fn unsubscribe(&self, host: &HostEndpoint, service: SonosService, sid: &str) -> bool {
        let (url, method) = match event_url(host, service)
            .and_then(|url| Ok((url, gena_method("UNSUBSCRIBE")?)))
        {
            Ok(request) => request,
            Err(e) => {
                log::warn!("[GENA] {}", e);
                return false;
            }
        };

        match self
            .client
            .request(method, &url)
            .header("SID", sid)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("[GENA] UNSUBSCRIBE {} failed: {}", sid, e);
                false
            }
        }
    }
}

//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the session handle.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::error::{SonokeyError, SonokeyResult};
use crate::keys::RemoteKey;
use crate::protocol_constants::{GENA_CALLBACK_PATH, MAX_GENA_BODY_SIZE, SERVICE_ID};

// ─────────────────────────────────────────────────────────────────────────────
// GENA Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Validates required GENA headers and extracts SID and SEQ values.
fn validate_gena_headers(headers: &HeaderMap) -> SonokeyResult<(String, String)> {
    let nt = headers.get("NT").and_then(|v| v.to_str().ok());
    if nt != Some("upnp:event") {
        log::warn!("[GENA] NOTIFY missing or invalid NT header: {:?}", nt);
        return Err(SonokeyError::InvalidRequest(
            "Missing or invalid NT header".into(),
        ));
    }

    let nts = headers.get("NTS").and_then(|v| v.to_str().ok());
    if nts != Some("upnp:propchange") {
        log::warn!("[GENA] NOTIFY missing or invalid NTS header: {:?}", nts);
        return Err(SonokeyError::InvalidRequest(
            "Missing or invalid NTS header".into(),
        ));
    }

    let sid = match headers.get("SID").and_then(|v| v.to_str().ok()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            log::warn!("[GENA] NOTIFY missing SID header");
            return Err(SonokeyError::InvalidRequest("Missing SID header".into()));
        }
    };

    // Logged only; ordering comes from arrival
    let seq = headers
        .get("SEQ")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?")
        .to_string();

    Ok((sid, seq))
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/state", get(get_state))
        .route("/api/keys/{key}", post(press_key))
        .route(GENA_CALLBACK_PATH, any(handle_gena_notify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe. Always 200 while the server is up, resolved or not.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_ID,
    }))
}

async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.view())
}

async fn press_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> SonokeyResult<impl IntoResponse> {
    let key: RemoteKey = key.parse()?;
    let snapshot = state.session.press(key).await?;
    Ok(Json(snapshot))
}

/// Accepts a push from the coordinator.
///
/// Well-formed pushes get 200 even when they are dropped (unknown SID or no
/// session yet); a non-2xx reply would make the coordinator drop the
/// subscription.
async fn handle_gena_notify(
    State(state): State<AppState>,
    req: Request<Body>,
) -> SonokeyResult<impl IntoResponse> {
    let (parts, body) = req.into_parts();

    if parts.method.as_str() != "NOTIFY" {
        return Err(SonokeyError::InvalidRequest(format!(
            "Expected NOTIFY method, got {}",
            parts.method
        )));
    }

    let (sid, seq) = validate_gena_headers(&parts.headers)?;

    let body_bytes = axum::body::to_bytes(body, MAX_GENA_BODY_SIZE)
        .await
        .map_err(|e| {
            log::warn!("[GENA] Failed to read NOTIFY body: {}", e);
            SonokeyError::InvalidRequest("Failed to read body".into())
        })?;

    let applied = state
        .session
        .handle_notify(&sid, &String::from_utf8_lossy(&body_bytes));

    if applied {
        log::debug!("[GENA] NOTIFY from {} (SEQ: {}) applied", sid, seq);
    } else {
        log::trace!("[GENA] NOTIFY from {} (SEQ: {}) - nothing applied", sid, seq);
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use reqwest::Method;
    use tokio_util::sync::CancellationToken;

    use crate::events::{EventEmitter, NoopEventEmitter};
    use crate::permissions::AlwaysGranted;
    use crate::services::SessionHandle;
    use crate::sonos::mock::MockSonos;
    use crate::sonos::services::SonosService;
    use crate::sonos::test_fixtures::GROUP_RENDERING_CONTROL_NOTIFY;
    use crate::state::Config;

    struct TestServer {
        addr: SocketAddr,
        handle: Arc<SessionHandle>,
        cancel: CancellationToken,
    }

    impl TestServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            let addr = listener.local_addr().expect("addr");
            let handle = Arc::new(SessionHandle::new());
            let cancel = CancellationToken::new();
            tokio::spawn(crate::api::start_server(
                listener,
                AppState::new(Arc::clone(&handle)),
                cancel.clone(),
            ));
            Self {
                addr,
                handle,
                cancel,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn resolve(&self, mock: &Arc<MockSonos>) {
            self.handle
                .establish(
                    Arc::clone(mock),
                    Config::new("Bedroom", "http://127.0.0.1:8149"),
                    &AlwaysGranted,
                    Arc::new(NoopEventEmitter) as Arc<dyn EventEmitter>,
                    CancellationToken::new(),
                )
                .await
                .expect("established");
        }

        async fn stop(self) {
            self.handle.shutdown().await;
            self.cancel.cancel();
        }
    }

    fn notify(client: &reqwest::Client, url: String, sid: &str) -> reqwest::RequestBuilder {
        client
            .request(Method::from_bytes(b"NOTIFY").expect("method"), url)
            .header("NT", "upnp:event")
            .header("NTS", "upnp:propchange")
            .header("SID", sid)
            .header("SEQ", "0")
    }

    #[test]
    fn gena_headers_require_nt_nts_and_sid() {
        let mut headers = HeaderMap::new();
        headers.insert("NT", HeaderValue::from_static("upnp:event"));
        headers.insert("NTS", HeaderValue::from_static("upnp:propchange"));
        assert!(validate_gena_headers(&headers).is_err());

        headers.insert("SID", HeaderValue::from_static("uuid:RINCON_SUB-1"));
        let (sid, seq) = validate_gena_headers(&headers).expect("valid");
        assert_eq!(sid, "uuid:RINCON_SUB-1");
        assert_eq!(seq, "?");

        headers.insert("NTS", HeaderValue::from_static("upnp:other"));
        assert!(validate_gena_headers(&headers).is_err());
    }

    #[tokio::test]
    async fn health_reports_service() {
        let server = TestServer::start().await;
        let body: serde_json::Value = reqwest::get(server.url("/health"))
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_ID);
        server.stop().await;
    }

    #[tokio::test]
    async fn key_press_before_resolution_is_conflict() {
        let server = TestServer::start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(server.url("/api/keys/volume_up"))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 409);

        let body: serde_json::Value = response.json().await.expect("json");
        assert_eq!(body["error"], "not_connected");
        server.stop().await;
    }

    #[tokio::test]
    async fn unknown_key_is_bad_request() {
        let server = TestServer::start().await;
        let response = reqwest::Client::new()
            .post(server.url("/api/keys/eject"))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 400);
        server.stop().await;
    }

    #[tokio::test]
    async fn notify_before_resolution_is_acknowledged() {
        let server = TestServer::start().await;
        let response = notify(
            &reqwest::Client::new(),
            server.url(GENA_CALLBACK_PATH),
            "uuid:RINCON_SUB-1",
        )
        .body(GROUP_RENDERING_CONTROL_NOTIFY)
        .send()
        .await
        .expect("request");
        assert_eq!(response.status().as_u16(), 200);

        let view = server.handle.view();
        assert!(!view.connected);
        assert_eq!(view.state.volume, None);
        server.stop().await;
    }

    #[tokio::test]
    async fn callback_rejects_other_methods() {
        let server = TestServer::start().await;
        let response = reqwest::get(server.url(GENA_CALLBACK_PATH))
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 400);
        server.stop().await;
    }

    #[tokio::test]
    async fn resolved_session_handles_keys_and_pushes() {
        let server = TestServer::start().await;
        let mock = Arc::new(MockSonos::new());
        mock.set_volume(30);
        server.resolve(&mock).await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .post(server.url("/api/keys/volume_down"))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        assert_eq!(body["volume"], 28);

        let sid = mock
            .sid_for(SonosService::GroupRenderingControl)
            .expect("sid");
        let response = notify(&client, server.url(GENA_CALLBACK_PATH), &sid)
            .body(GROUP_RENDERING_CONTROL_NOTIFY)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 200);

        let view: serde_json::Value = reqwest::get(server.url("/api/state"))
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        assert_eq!(view["connected"], true);
        assert_eq!(view["group"], "Bedroom");
        assert_eq!(view["volume"], 27);
        assert_eq!(view["subscription"], "subscribed");

        server.stop().await;
    }
}

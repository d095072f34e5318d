//! HTTP API layer.
//!
//! Hosts the GENA callback the coordinator pushes to, plus a small local API
//! for reading state and pressing keys. Handlers are thin and delegate to the
//! [`SessionHandle`].

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::services::SessionHandle;

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Slot for the active control session.
    pub session: Arc<SessionHandle>,
}

impl AppState {
    pub fn new(session: Arc<SessionHandle>) -> Self {
        Self { session }
    }
}

/// Binds the callback listener on all interfaces.
///
/// Port 0 picks an ephemeral port; read it back from the listener.
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    Ok(TcpListener::bind(addr).await?)
}

/// Serves the router on `listener` until `cancel` fires.
pub async fn start_server(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("[Server] Listening on http://{}", addr);
    }

    let app = http::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    log::info!("[Server] Stopped");
    Ok(())
}

//! Sonokey - headless media-key daemon for a Sonos group.
//!
//! Starts the GENA callback server, establishes a control session for the
//! configured group and feeds key presses into it. Keys arrive one per line
//! on stdin (`volume_up`, `play_pause`, ...) or via `POST /api/keys/{key}`.

mod config;
mod osd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sonokey_core::{
    bind, start_server, AppState, EventEmitter, LocalIpDetector, NetworkInterfaceGate, RemoteKey,
    SessionHandle, SonokeyError, SonosClientImpl, UrlBuilder,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::osd::OsdEmitter;

/// Sonokey - media-key control of a single Sonos group.
#[derive(Parser, Debug)]
#[command(name = "sonokey")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SONOKEY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Callback server port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Group display name to control (overrides config file).
    #[arg(short = 'g', long)]
    group: Option<String>,

    /// Callback base URL reachable by the speakers (overrides config file).
    #[arg(long, value_name = "URL")]
    callback_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Sonokey v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(group) = args.group {
        config.target_group = Some(group);
    }
    if let Some(url) = args.callback_url {
        config.callback_url = Some(url);
    }

    let listener = bind(config.bind_port)
        .await
        .with_context(|| format!("Failed to bind callback port {}", config.bind_port))?;
    let port = listener
        .local_addr()
        .context("Failed to read callback server address")?
        .port();

    let callback_base = match config.callback_url.clone() {
        Some(url) => url,
        None => UrlBuilder::detect(&LocalIpDetector::new(), port)
            .context(
                "Failed to auto-detect local IP address. \
                 Please specify --callback-url or set SONOKEY_CALLBACK_URL to a URL \
                 that Sonos speakers can reach.",
            )?
            .base_url()
            .to_string(),
    };
    let core_config = config.to_core_config(&callback_base)?;
    log::info!(
        "Configuration: group={:?}, callback={}",
        core_config.target_group,
        callback_base
    );

    let cancel = CancellationToken::new();
    let handle = Arc::new(SessionHandle::new());

    let server_handle = tokio::spawn(start_server(
        listener,
        AppState::new(Arc::clone(&handle)),
        cancel.child_token(),
    ));

    let client = Arc::new(SonosClientImpl::with_defaults().context("Failed to create HTTP client")?);
    let emitter: Arc<dyn EventEmitter> = Arc::new(OsdEmitter);

    let establish = handle.establish(
        client,
        core_config,
        &NetworkInterfaceGate,
        emitter,
        cancel.child_token(),
    );
    tokio::pin!(establish);

    let result = tokio::select! {
        result = &mut establish => result,
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cancelling session setup...");
            cancel.cancel();
            establish.await
        }
    };

    let outcome = match result {
        Ok(session) => {
            log::info!(
                "Controlling \"{}\" via {}",
                session.group().name,
                session.coordinator()
            );
            if !cancel.is_cancelled() {
                run_until_shutdown(Arc::clone(&handle)).await;
                log::info!("Shutdown signal received, cleaning up...");
            }
            Ok(())
        }
        Err(SonokeyError::Cancelled(stage)) => {
            log::info!("Session setup cancelled during {}", stage);
            Ok(())
        }
        Err(e) => {
            log::error!("Session setup failed at {}: {}", e.stage(), e);
            if e.is_configuration_error() {
                log::error!("Check the configured group name and callback URL");
            }
            Err(anyhow::Error::new(e).context("Failed to establish session"))
        }
    };

    handle.shutdown().await;
    cancel.cancel();
    match server_handle.await {
        Ok(Err(e)) => log::error!("Server error: {}", e),
        Err(e) => log::error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    log::info!("Shutdown complete");
    outcome
}

/// Feeds stdin keys into the session until a shutdown signal arrives.
///
/// End of input only stops the stdin source; the HTTP key route keeps working.
async fn run_until_shutdown(handle: Arc<SessionHandle>) {
    tokio::select! {
        result = read_keys(handle) => {
            if let Err(e) = result {
                log::warn!("Key input stopped: {}", e);
            } else {
                log::debug!("Key input closed");
            }
            shutdown_signal().await;
        }
        _ = shutdown_signal() => {}
    }
}

async fn read_keys(handle: Arc<SessionHandle>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let key: RemoteKey = match line.parse() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };

        match handle.press(key).await {
            Ok(state) => log::debug!("{} -> {:?}", key, state),
            Err(e) => log::warn!("{} failed at {}: {}", key, e.stage(), e),
        }
    }
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

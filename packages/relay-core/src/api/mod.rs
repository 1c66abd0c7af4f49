//! HTTP API layer.
//!
//! Thin connection handling that delegates to [`crate::registry::MountRegistry`]
//! and the session types it hands out. This module owns the wire protocol
//! only - it holds no streaming state of its own.
//!
//! Unlike a typical JSON API, the mount-facing wire protocol (source ingest,
//! listener delivery) is not a conventional request/response exchange: a
//! source connection sends one "request" and then keeps the same connection
//! open indefinitely as an ongoing byte stream, and a listener connection's
//! response body is unbounded and close-terminated (spec §6). Real Icecast
//! servers handle this by hijacking the raw connection once headers are
//! parsed (the Go reference implementation this was modeled on literally
//! calls `http.Hijacker`); this module does the Rust equivalent by speaking
//! HTTP/1.0 directly over an accepted [`tokio::net::TcpStream`] rather than
//! routing mount traffic through a request/response framework. See
//! `DESIGN.md` for why this departs from the rest of the pack's usual axum
//! stack.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::registry::MountRegistry;
use crate::state::RelayConfig;

pub mod http;

/// Errors that can occur when starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured TCP port.
    #[error("failed to bind to port {0}: {1}")]
    Bind(u16, std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MountRegistry>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(MountRegistry::from_config(&config));
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}

/// Binds and serves the wire protocol until `shutdown` resolves.
///
/// Each accepted connection is handled on its own spawned task by
/// [`http::handle_connection`]. On shutdown, the accept loop stops taking
/// new connections and every mount is signaled to close via
/// [`MountRegistry::close_all`] so in-flight sessions begin draining before
/// the process actually exits; this function does not itself wait for that
/// drain to finish (callers needing that poll `Mount::listener_count`).
pub async fn start_server(
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.bind_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(state.config.bind_port, e))?;

    log::info!("relay server listening on {addr}");

    let accept_cancel = CancellationToken::new();
    let result = {
        let accept_cancel = accept_cancel.clone();
        tokio::select! {
            biased;
            () = shutdown => Ok(()),
            result = accept_loop(listener, state.clone(), accept_cancel) => result,
        }
    };
    accept_cancel.cancel();

    log::info!("shutting down, draining all mounts");
    state.registry.close_all();
    result
}

async fn accept_loop(
    listener: tokio::net::TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    continue;
                }
            },
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = http::handle_connection(stream, peer, state).await {
                log::debug!("connection from {peer} ended: {e}");
            }
        });
    }
}

//! Listener manager: one accept loop per listen address, shared shutdown.
//!
//! ```text
//!            ┌── accept loop (addr 1) ──┐
//! shutdown ──┤                          ├──► per-connection task (TLS + driver)
//!  token     └── accept loop (addr 2) ──┘            │
//!                                                    ▼
//!                 TaskTracker ◄───────── every task is tracked
//! ```
//!
//! [`RunningServer::shutdown`] raises the relay's stopping flag, cancels the
//! token, and closes the tracker; [`RunningServer::wait`] returns once every
//! accept loop and every connection task has finished.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::application::Relay;
use crate::domain::ConnectionSettings;
use crate::infrastructure::connection::serve_connection;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised while starting the listeners.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No configured address could be bound.
    #[error("no listener could be started ({attempted} address(es) attempted)")]
    NoListeners { attempted: usize },
}

/// Handle to the running listeners.
#[derive(Debug)]
pub struct RunningServer {
    local_addrs: Vec<SocketAddr>,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl RunningServer {
    /// Addresses actually bound, in configuration order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Stops accepting and asks every connection to close.  Idempotent.
    pub fn shutdown(&self) {
        self.relay.begin_stopping();
        self.shutdown.cancel();
        self.tracker.close();
    }

    /// Waits until every listener and connection task has finished.
    ///
    /// Only returns after [`RunningServer::shutdown`] has been called.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

/// Binds every address and starts accepting.
///
/// Addresses that fail to bind are logged and skipped.
///
/// # Errors
///
/// Returns [`ServerError::NoListeners`] if no address could be bound.
pub async fn start(
    addresses: &[SocketAddr],
    acceptor: TlsAcceptor,
    relay: Arc<Relay>,
    settings: ConnectionSettings,
) -> Result<RunningServer, ServerError> {
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();
    let mut local_addrs = Vec::with_capacity(addresses.len());

    for addr in addresses {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to listen on {addr}: {e}");
                continue;
            }
        };
        let local = listener.local_addr().unwrap_or(*addr);
        info!("Listening on {local}");
        local_addrs.push(local);

        tracker.spawn(accept_loop(
            listener,
            acceptor.clone(),
            relay.clone(),
            settings.clone(),
            shutdown.clone(),
            tracker.clone(),
        ));
    }

    if local_addrs.is_empty() {
        tracker.close();
        return Err(ServerError::NoListeners {
            attempted: addresses.len(),
        });
    }

    Ok(RunningServer {
        local_addrs,
        relay,
        shutdown,
        tracker,
    })
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    relay: Arc<Relay>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                report_accept_error(&relay, &e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        tracker.spawn(handle_connection(
            stream,
            peer,
            acceptor.clone(),
            relay.clone(),
            settings.clone(),
            shutdown.clone(),
        ));
    }

    if let Ok(local) = listener.local_addr() {
        debug!("Listener on {local} stopped.");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    relay: Arc<Relay>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {peer}: {e}");
    }

    let handshake = timeout(settings.handshake_timeout, acceptor.accept(stream));
    let tls = tokio::select! {
        _ = shutdown.cancelled() => return,
        result = handshake => match result {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                if !relay.is_stopping() {
                    debug!("TLS handshake with {peer} failed: {e}");
                }
                return;
            }
            Err(_) => {
                debug!("TLS handshake with {peer} timed out.");
                return;
            }
        },
    };

    serve_connection(tls, peer.ip().to_string(), relay, settings, shutdown).await;
}

/// Accept failures are transport errors: debug level, silent while stopping.
fn report_accept_error(relay: &Relay, e: &std::io::Error) {
    if !relay.is_stopping() {
        debug!("Error accepting connection: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

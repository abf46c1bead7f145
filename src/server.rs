//! SOCKS5 relay server
//!
//! Owns the listening socket. Each accepted connection gets its own
//! session task with no shared mutable state beyond the immutable
//! configuration. `stop` only ends the accept loop; in-flight sessions
//! run to completion on their own.

use crate::config::{ServerConfig, UpstreamEndpoint};
use crate::error::RelayError;
use crate::socks::handle_session;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the server state, shaped for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    /// Whether the accept loop is running
    pub running: bool,
    /// Configured bind host
    pub host: String,
    /// Bound port (configured port until `start` succeeds)
    pub port: u16,
    /// Whether authentication is required
    pub auth_required: bool,
    /// Number of configured upstream endpoints
    pub upstreams: usize,
}

/// SOCKS5 relay server
pub struct Socks5Server {
    config: Arc<ServerConfig>,
    shutdown_tx: broadcast::Sender<()>,
    local_addr: Option<SocketAddr>,
    accept_handle: Option<JoinHandle<()>>,
}

impl Socks5Server {
    /// Create a server from configuration. Nothing is bound until
    /// [`start`](Self::start).
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Socks5Server {
            config: Arc::new(config),
            shutdown_tx,
            local_addr: None,
            accept_handle: None,
        }
    }

    /// Get a reference to the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Returns the bound address. A bind failure (e.g. address in use) is
    /// fatal and propagates; accept errors after startup are logged and
    /// the loop continues.
    pub async fn start(&mut self) -> Result<SocketAddr, RelayError> {
        self.config.validate().map_err(RelayError::Config)?;

        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RelayError::Bind {
                addr: bind_addr,
                source: e,
            })?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);

        info!("SOCKS5 server listening on {}", addr);

        let config = Arc::clone(&self.config);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((socket, peer)) => {
                                debug!("accepted connection from {}", peer);
                                if let Err(e) = config.socket_opts().apply(&socket) {
                                    debug!("failed to apply socket options for {}: {}", peer, e);
                                }
                                let config = Arc::clone(&config);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_session(socket, &config).await {
                                        debug!("session from {} ended: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => warn!("accept error: {}", e),
                        }
                    }
                }
            }
            info!("SOCKS5 server stopped");
        });
        self.accept_handle = Some(handle);

        Ok(addr)
    }

    /// Stop accepting new connections. In-flight sessions complete on
    /// their own; there is no drain timeout.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the accept loop to exit
    pub async fn wait(&mut self) {
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.await;
        }
    }

    /// Snapshot of the server state
    pub fn status(&self) -> ServerStatus {
        let running = self
            .accept_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        ServerStatus {
            running,
            host: self.config.bind_host.clone(),
            port: self
                .local_addr
                .map(|a| a.port())
                .unwrap_or(self.config.bind_port),
            auth_required: self.config.auth_required,
            upstreams: self.config.upstreams.len(),
        }
    }

    /// Diagnostic connectivity probe of the configured upstream
    /// endpoints. Returns the reachable subset. The relay path never
    /// consults these endpoints.
    pub async fn probe_upstreams(&self) -> Vec<UpstreamEndpoint> {
        let probe_timeout = Duration::from_secs(self.config.probe_timeout);
        let mut reachable = Vec::new();

        for endpoint in &self.config.upstreams {
            let attempt = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
            match tokio::time::timeout(probe_timeout, attempt).await {
                Ok(Ok(_)) => {
                    info!("upstream {} is reachable", endpoint);
                    reachable.push(endpoint.clone());
                }
                Ok(Err(e)) => info!("upstream {} failed: {}", endpoint, e),
                Err(_) => info!("upstream {} timed out", endpoint),
            }
        }

        reachable
    }
}

//! `GatehouseServer` builder and accept loop.
//!
//! This is the entry point for running the gateway. It ties together
//! all the layers: transport → protocol → session → store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_protocol::{Codec, HostList, TextCodec};
use gatehouse_session::{Authenticator, SessionRegistry};
use gatehouse_store::Repository;
use gatehouse_transport::{CloseHandle, TcpTransport, Transport};
use tokio::task::{JoinError, JoinSet};

use crate::GateError;
use crate::handler::handle_connection;
use crate::hosts::{self, HostDirectory};

/// Pause after an accept fails for lack of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Settings for a [`GatehouseServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IPv4 address to listen on.
    ///
    /// Default: `0.0.0.0:5555`.
    pub bind_addr: String,

    /// How often the host list is reloaded from the repository. Zero
    /// disables the periodic reload.
    ///
    /// Default: 10 seconds.
    pub hosts_refresh: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5555".to_string(),
            hosts_refresh: Duration::from_secs(10),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<R: Repository, A: Authenticator, C: Codec> {
    pub(crate) registry: SessionRegistry,
    pub(crate) repo: R,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) hosts: HostDirectory,
}

/// Builder for configuring and starting a Gatehouse server.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse::prelude::*;
///
/// let repo = MemoryRepository::load("fixtures.json")?;
/// let auth = RepositoryAuthenticator::new(repo.clone(), Argon2Verifier::new());
/// let server = GatehouseServerBuilder::new()
///     .bind("0.0.0.0:5555")
///     .build(repo, auth)
///     .await?;
/// server.serve(CloseHandle::new()).await
/// ```
pub struct GatehouseServerBuilder {
    config: ServerConfig,
}

impl GatehouseServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the host list reload period.
    pub fn hosts_refresh(mut self, period: Duration) -> Self {
        self.config.hosts_refresh = period;
        self
    }

    /// Binds the listener and loads the initial host list.
    ///
    /// Uses [`TextCodec`], the only dialect 1.29 clients speak. A failed
    /// host list load is logged and the server starts with an empty list.
    pub async fn build<R: Repository, A: Authenticator>(
        self,
        repo: R,
        auth: A,
    ) -> Result<GatehouseServer<R, A, TextCodec>, GateError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;

        let initial = match hosts::load_hosts(&repo).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "initial host list load failed");
                HostList::default()
            }
        };

        let state = Arc::new(ServerState {
            registry: SessionRegistry::new(),
            repo,
            auth,
            codec: TextCodec,
            hosts: HostDirectory::new(initial),
        });

        Ok(GatehouseServer {
            transport,
            state,
            hosts_refresh: self.config.hosts_refresh,
        })
    }
}

impl Default for GatehouseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Gatehouse server.
///
/// Call [`serve()`](Self::serve) to start accepting connections.
pub struct GatehouseServer<R: Repository, A: Authenticator, C: Codec> {
    transport: TcpTransport,
    state: Arc<ServerState<R, A, C>>,
    hosts_refresh: Duration,
}

impl<R, A, C> GatehouseServer<R, A, C>
where
    R: Repository,
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the host list handle.
    pub fn hosts(&self) -> HostDirectory {
        self.state.hosts.clone()
    }

    /// Returns the session registry.
    pub fn registry(&self) -> SessionRegistry {
        self.state.registry.clone()
    }

    /// Runs the accept loop until `shutdown` closes or the listener
    /// fails.
    ///
    /// Each connection runs in its own task. On exit every live
    /// connection is closed and all tasks are awaited before returning.
    ///
    /// # Errors
    /// A listener-level [`TransportError`](gatehouse_transport::TransportError).
    /// Per-connection accept failures are logged and skipped.
    pub async fn serve(self, shutdown: CloseHandle) -> Result<(), GateError> {
        let root = shutdown.child();
        let mut transport = self.transport.with_close_handle(root.clone());
        let mut tasks = JoinSet::new();

        if !self.hosts_refresh.is_zero() {
            tasks.spawn(hosts::refresh_hosts(
                self.state.repo.clone(),
                self.state.hosts.clone(),
                self.hosts_refresh,
                root.clone(),
            ));
        }

        tracing::info!("Gatehouse server running");

        let result = loop {
            tokio::select! {
                biased;
                _ = root.closed() => break Ok(()),
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        tasks.spawn(handle_connection(conn, Arc::clone(&self.state)));
                    }
                    Err(e) if e.is_connection_level() => {
                        tracing::error!(error = %e, "accept failed");
                        if e.is_resource_exhausted() {
                            tokio::select! {
                                _ = root.closed() => {}
                                _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                            }
                        }
                    }
                    Err(e) => break Err(GateError::from(e)),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
            }
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "listener failed, shutting down");
        }

        let _ = transport.shutdown().await;
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        tracing::info!("Gatehouse server stopped");
        result
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "connection task panicked");
        }
    }
}

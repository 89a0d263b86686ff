//! The game server host list.
//!
//! Sessions read the host list on every successful login, and a
//! background task replaces it periodically. Readers get an immutable
//! `Arc<HostList>` snapshot and never block the refresher.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_protocol::{HostEntry, HostList, HostState};
use gatehouse_store::{GameServer, Repository, StoreError};
use gatehouse_transport::CloseHandle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Shared handle to the current host list snapshot.
#[derive(Clone)]
pub struct HostDirectory {
    tx: Arc<watch::Sender<Arc<HostList>>>,
}

impl HostDirectory {
    /// Creates a directory holding `initial`.
    pub fn new(initial: HostList) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> Arc<HostList> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replaces the snapshot.
    pub fn publish(&self, hosts: HostList) {
        self.tx.send_replace(Arc::new(hosts));
    }

    /// Returns a receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<HostList>> {
        self.tx.subscribe()
    }
}

/// Builds the host list from game server records. A server accepts
/// logins only while online.
pub fn host_list(servers: &[GameServer]) -> HostList {
    HostList {
        entries: servers
            .iter()
            .map(|s| HostEntry {
                id: s.id,
                state: s.state,
                completion: s.completion,
                can_log: s.state == HostState::Online,
            })
            .collect(),
    }
}

/// Loads every game server and builds a fresh host list.
pub(crate) async fn load_hosts<R: Repository>(repo: &R) -> Result<HostList, StoreError> {
    let servers = repo.game_servers().await?;
    Ok(host_list(&servers))
}

/// Reloads the host list every `period` until `shutdown` closes.
///
/// A failed reload is logged and the previous snapshot stays.
pub(crate) async fn refresh_hosts<R: Repository>(
    repo: R,
    hosts: HostDirectory,
    period: Duration,
    shutdown: CloseHandle,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the caller already loaded once.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.closed() => break,
            _ = ticker.tick() => {}
        }

        match load_hosts(&repo).await {
            Ok(list) => {
                tracing::debug!(servers = list.entries.len(), "host list refreshed");
                hosts.publish(list);
            }
            Err(e) => {
                tracing::warn!(error = %e, "host list refresh failed, keeping previous");
            }
        }
    }
}

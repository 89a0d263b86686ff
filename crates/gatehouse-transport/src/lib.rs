//! Transport layer for Gatehouse.
//!
//! Provides the [`Transport`] and [`Connection`] traits and the raw TCP
//! implementation game clients speak: ASCII frames terminated by a NUL
//! byte ([`FrameCodec`]).
//!
//! Every connection carries a [`CloseHandle`]. Any task holding a clone
//! can close the connection, and the owning task's pending
//! [`Connection::recv`] returns `Ok(None)` immediately. This is how the
//! session registry evicts a session that lives on another task.

#![allow(async_fn_in_trait)]

mod error;
mod frame;
mod tcp;

pub use error::TransportError;
pub use frame::{FrameCodec, MAX_FRAME_LEN};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A cloneable handle that closes a connection from any task.
///
/// Closing is idempotent. A handle derived from a parent (see
/// [`CloseHandle::child`]) is closed when the parent closes, which lets
/// one process-wide shutdown handle reach every live connection.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(CancellationToken);

impl CloseHandle {
    /// Creates a fresh, open handle.
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Creates a handle that also closes when `self` closes.
    pub fn child(&self) -> Self {
        Self(self.0.child_token())
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.0.cancel();
    }

    /// Returns `true` once the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        self.0.cancelled().await
    }
}

impl From<CancellationToken> for CloseHandle {
    fn from(token: CancellationToken) -> Self {
        Self(token)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting and closes every connection accepted so far.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the stream or the
    /// connection was closed through its [`CloseHandle`].
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;

    /// Returns a handle that closes this connection from another task.
    fn close_handle(&self) -> CloseHandle;
}

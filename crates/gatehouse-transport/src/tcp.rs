//! Raw TCP transport with NUL-terminated frames.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    CloseHandle, Connection, ConnectionId, FrameCodec, Transport,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] bound to one IPv4 address.
pub struct TcpTransport {
    listener: TcpListener,
    root: CloseHandle,
}

impl TcpTransport {
    /// Binds a new transport to the given address.
    ///
    /// The address is resolved and the first IPv4 result is used; an
    /// address with no IPv4 form is rejected.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let mut resolved = tokio::net::lookup_host(addr)
            .await
            .map_err(TransportError::ListenFailed)?;
        let v4 = resolved
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()))?;

        let listener = TcpListener::bind(v4)
            .await
            .map_err(TransportError::ListenFailed)?;
        tracing::info!(addr = %v4, "TCP transport listening");

        Ok(Self {
            listener,
            root: CloseHandle::new(),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Ties every connection accepted from now on to `handle`: closing it
    /// closes them all.
    pub fn with_close_handle(mut self, handle: CloseHandle) -> Self {
        self.root = handle;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) =
            self.listener.accept().await.map_err(classify_accept_error)?;

        stream.set_nodelay(true).map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read, write) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer,
            reader: Mutex::new(FramedRead::new(read, FrameCodec::new())),
            writer: Mutex::new(FramedWrite::new(write, FrameCodec::new())),
            closer: self.root.child(),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.root.close();
        Ok(())
    }
}

/// Splits accept errors into per-connection, exhaustion and listener
/// failures. Only the last one stops the accept loop.
fn classify_accept_error(e: io::Error) -> TransportError {
    if is_exhaustion(&e) {
        return TransportError::Exhausted(e);
    }
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => TransportError::AcceptFailed(e),
        _ => TransportError::ListenFailed(e),
    }
}

#[cfg(unix)]
fn is_exhaustion(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory
}

/// A single client connection.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, FrameCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    closer: CloseHandle,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.closer.is_closed() {
            return Err(TransportError::ConnectionClosed(
                "closed by server".into(),
            ));
        }
        self.writer
            .lock()
            .await
            .send(data.to_vec())
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = self.closer.closed() => Ok(None),
            frame = reader.next() => match frame {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => Err(TransportError::ReceiveFailed(e)),
                None => Ok(None),
            },
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closer.close();
        self.writer
            .lock()
            .await
            .close()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }
}

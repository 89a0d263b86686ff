/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed (including oversized frames).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Accepting a single connection failed. The listener is still usable.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The process or system ran out of descriptors or buffers while
    /// accepting. The listener is still usable once some are released.
    #[error("accept failed, out of resources: {0}")]
    Exhausted(#[source] std::io::Error),

    /// The listening socket itself failed; no further accepts are possible.
    #[error("listener failed: {0}")]
    ListenFailed(#[source] std::io::Error),

    /// The address is not a usable IPv4 socket address.
    #[error("invalid listen address {0:?}: only IPv4 is supported")]
    InvalidAddress(String),
}

impl TransportError {
    /// Returns `true` if the error concerns one connection only and the
    /// accept loop may keep going.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::AcceptFailed(_) | Self::Exhausted(_))
    }

    /// Returns `true` if accepting should pause before the next attempt.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

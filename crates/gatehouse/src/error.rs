//! Unified error type for the gateway.

use gatehouse_protocol::ProtocolError;
use gatehouse_session::SessionError;
use gatehouse_store::StoreError;
use gatehouse_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts sub-crate errors automatically.
///
/// Inside a connection task every exit is an `Err` of this type, and
/// the variant decides how loudly it is logged: see
/// [`is_disconnect`](Self::is_disconnect) and
/// [`is_operational`](Self::is_operational).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame that does not decode, or a message out of order.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An authentication or session-state error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A repository error outside authentication.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session ended on purpose: a refused login, or a completed
    /// server selection.
    #[error("end of service")]
    EndOfService,
}

impl GateError {
    /// Returns `true` for ordinary endings: deliberate termination or the
    /// peer going away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::EndOfService | Self::Transport(_))
    }

    /// Returns `true` for backend failures worth a warning.
    pub fn is_operational(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Session(e) => e.is_operational(),
            _ => false,
        }
    }
}

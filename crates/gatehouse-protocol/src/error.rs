//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Every decode failure ends the session without telling the client why,
/// so the variants only need to be useful in logs.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A server message could not be turned into a frame, e.g. a text
    /// field contained a byte the framing reserves.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The frame is not valid UTF-8 or does not parse as the message the
    /// current phase expects.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The frame carries a message prefix this server does not handle.
    #[error("unknown message {0:?}")]
    UnknownMessage(String),

    /// The message parsed but is not allowed in the session's current
    /// state.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
}

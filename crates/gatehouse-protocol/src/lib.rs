//! Login protocol for Gatehouse.
//!
//! This crate defines the "language" game clients and the login gateway
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], identifiers, the
//!   host list) — what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]) — how those messages are
//!   converted to and from frame bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and session
//! (protocol state). It doesn't know about sockets or accounts, except
//! that client frames are read differently depending on the session's
//! [`Phase`]: the first two client frames carry no message prefix.
//!
//! ```text
//! Transport (frames) → Protocol (ClientMessage) → Session (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, Phase, TextCodec};
pub use error::ProtocolError;
pub use types::{
    AccountId, ClientMessage, ClientVersion, Credential, GameServerId,
    HostEntry, HostList, HostState, LoginErrorReason, MIN_CLIENT_VERSION,
    QueueNotice, ServerCharacters, ServerMessage, UserId,
};

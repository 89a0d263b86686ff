//! Core protocol types for the login gateway.
//!
//! Every type here either travels on the wire or names something that
//! does. The identifier newtypes are also used by the store and session
//! crates so that an account id can never be passed where a game server
//! id is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a game account.
///
/// Serializes as the plain inner integer, so `AccountId(7)` is `7` in
/// JSON fixtures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub i32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// A unique identifier for a user, the person owning one or more
/// accounts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a game-world server.
///
/// Ordered, because every per-server listing is sent sorted by id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct GameServerId(pub i32);

impl fmt::Display for GameServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientVersion
// ---------------------------------------------------------------------------

/// Oldest client version the gateway accepts.
pub const MIN_CLIENT_VERSION: ClientVersion = ClientVersion {
    major: 1,
    minor: 29,
    patch: 0,
};

/// The protocol dialect a client announces as its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ClientVersion {
    /// Returns `true` for the 1.x dialects from 1.29 on.
    ///
    /// Later majors are a different protocol, so only the minor is
    /// compared as a lower bound.
    pub fn is_supported(&self) -> bool {
        self.major == MIN_CLIENT_VERSION.major
            && self.minor >= MIN_CLIENT_VERSION.minor
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ClientVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::Decode(format!("invalid version {s:?}"));

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, ProtocolError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)
        };
        let version = ClientVersion {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// The login a client submits as its second frame.
///
/// `ciphertext` is the password obfuscated with the session salt using
/// the scheme named by `crypto_method`. No plaintext is ever stored here.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub ciphertext: String,
    pub crypto_method: u8,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("ciphertext", &"[REDACTED]")
            .field("crypto_method", &self.crypto_method)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Messages a game client sends to the login gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// First frame: the client's protocol version.
    AccountVersion(ClientVersion),

    /// Second frame: username and obfuscated password.
    AccountCredential(Credential),

    /// "Where am I in the queue?" Triggers the login on first receipt.
    AccountQueuePosition,

    /// Which servers does the user with this nickname play on?
    AccountSearchForFriend { nickname: String },

    /// Which servers does my account have characters on?
    AccountGetServersList,

    /// Connect me to this game server.
    AccountSetServer { id: GameServerId },
}

impl ClientMessage {
    /// Short name for logs. Never includes message contents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountVersion(_) => "AccountVersion",
            Self::AccountCredential(_) => "AccountCredential",
            Self::AccountQueuePosition => "AccountQueuePosition",
            Self::AccountSearchForFriend { .. } => "AccountSearchForFriend",
            Self::AccountGetServersList => "AccountGetServersList",
            Self::AccountSetServer { .. } => "AccountSetServer",
        }
    }
}

// ---------------------------------------------------------------------------
// Server-side payloads
// ---------------------------------------------------------------------------

/// Why a login was refused.
///
/// The client can tell these apart, and nothing finer: a wrong username
/// and a wrong password both map to [`AccessDenied`](Self::AccessDenied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginErrorReason {
    BadVersion,
    AccessDenied,
    AlreadyLoggedIn,
}

impl LoginErrorReason {
    /// The one-letter wire code.
    pub fn code(self) -> char {
        match self {
            Self::BadVersion => 'v',
            Self::AccessDenied => 'f',
            Self::AlreadyLoggedIn => 'a',
        }
    }
}

/// Whether a game server is reachable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    #[default]
    Offline,
    Online,
    Saving,
}

impl HostState {
    /// The numeric wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::Offline => 0,
            Self::Online => 1,
            Self::Saving => 2,
        }
    }
}

/// One game server in the host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub id: GameServerId,
    pub state: HostState,
    /// Population level, 0 (low) to 3 (full).
    pub completion: u8,
    pub can_log: bool,
}

/// The directory of game servers sent after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostList {
    pub entries: Vec<HostEntry>,
}

/// How many characters an account set has on one game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCharacters {
    pub server_id: GameServerId,
    pub count: u32,
}

/// A queue position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueNotice {
    pub position: u32,
    pub total_subscribers: u32,
    pub total_non_subscribers: u32,
    pub subscriber: bool,
    pub queue_id: u32,
}

impl QueueNotice {
    /// The fixed notice sent for every queue request.
    ///
    /// The client insists on a queue handshake, but the gateway never
    /// queues anybody: everyone is first in a queue of one.
    pub fn placeholder() -> Self {
        Self {
            position: 1,
            total_subscribers: 0,
            total_non_subscribers: 1,
            subscriber: false,
            queue_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Messages the login gateway sends to a game client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent on connect. `salt` keys the client's password obfuscation.
    HelloConnect { salt: String },

    /// The login was refused. `extra` is free text, e.g. the minimum
    /// accepted version for [`LoginErrorReason::BadVersion`].
    LoginError {
        reason: LoginErrorReason,
        extra: String,
    },

    /// The user's nickname.
    Pseudo { nickname: String },

    /// The user's community (language region) id.
    Community { id: i32 },

    /// The user's secret question.
    SecretQuestion { question: String },

    /// The current game server directory.
    Hosts(HostList),

    /// The login succeeded. `authorized` is set for administrators.
    LoginSuccess { authorized: bool },

    /// The synthetic queue position.
    Queue(QueueNotice),

    /// Answer to a friend search. Empty when nobody has the nickname.
    FriendServerList { servers: Vec<ServerCharacters> },

    /// Answer to a servers-list request.
    ServersList {
        /// Milliseconds of subscription left, zero when expired.
        subscription_ms: u64,
        servers: Vec<ServerCharacters>,
    },

    /// Where to connect next, and the ticket proving who you are.
    SelectServer {
        host: String,
        port: u16,
        ticket: String,
    },
}

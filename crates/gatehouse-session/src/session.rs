//! Per-connection session state.
//!
//! A [`Session`] is created on accept and owned by its connection task.
//! Nothing here is shared: the only piece other tasks can observe, the
//! bound account, is published through the
//! [`SessionRegistry`](crate::SessionRegistry).

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use gatehouse_protocol::{AccountId, ClientVersion, Credential, Phase};

use crate::SessionError;
use crate::crypto;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier, allocated in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next identifier.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Where a session is in the login sequence.
///
/// ```text
/// AwaitingVersion ─→ AwaitingCredential ─→ AwaitingQueueAck ─→ Idle
///        │                   │                    │              │
///        └───────────────────┴────────────────────┴──────────────┴─→ Terminated
/// ```
///
/// The variants are declared in order, so `a < b` means `a` comes
/// earlier. A session never moves to an earlier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    /// Connected; the next frame must be the client version.
    AwaitingVersion,
    /// Version stored; the next frame must be the credential.
    AwaitingCredential,
    /// Credential stored; the login runs on the first queue request.
    AwaitingQueueAck,
    /// Logged in and bound to an account.
    Idle,
    /// Done. No further messages are handled.
    Terminated,
}

impl SessionStatus {
    /// How the next client frame must be decoded.
    pub fn phase(self) -> Phase {
        match self {
            Self::AwaitingVersion => Phase::Version,
            Self::AwaitingCredential => Phase::Credential,
            Self::AwaitingQueueAck | Self::Idle | Self::Terminated => {
                Phase::Command
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client connection's login state.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    salt: String,
    status: SessionStatus,
    version: Option<ClientVersion>,
    credential: Option<Credential>,
    account_id: Option<AccountId>,
}

impl Session {
    /// Starts a session for `peer` with a fresh id and salt.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: SessionId::next(),
            peer,
            salt: crypto::generate_salt(),
            status: SessionStatus::AwaitingVersion,
            version: None,
            credential: None,
            account_id: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The salt sent to the client in the hello message.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn version(&self) -> Option<ClientVersion> {
        self.version
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The account this session logged in as, once the login succeeded.
    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    /// Moves to `to`. Staying put is allowed; going back is not.
    ///
    /// # Errors
    /// [`SessionError::StatusRegression`] if `to` comes before the
    /// current status.
    pub fn advance(&mut self, to: SessionStatus) -> Result<(), SessionError> {
        if to < self.status {
            return Err(SessionError::StatusRegression {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Records the announced client version.
    pub fn store_version(&mut self, version: ClientVersion) -> Result<(), SessionError> {
        self.advance(SessionStatus::AwaitingCredential)?;
        self.version = Some(version);
        Ok(())
    }

    /// Records the submitted credential.
    pub fn store_credential(
        &mut self,
        credential: Credential,
    ) -> Result<(), SessionError> {
        self.advance(SessionStatus::AwaitingQueueAck)?;
        self.credential = Some(credential);
        Ok(())
    }

    /// Marks the login as complete for `account_id`.
    ///
    /// Call only after the registry claim succeeded.
    pub fn bind_account(&mut self, account_id: AccountId) -> Result<(), SessionError> {
        self.advance(SessionStatus::Idle)?;
        self.account_id = Some(account_id);
        Ok(())
    }

    /// Ends the session. Always succeeds.
    pub fn terminate(&mut self) {
        self.status = SessionStatus::Terminated;
    }
}

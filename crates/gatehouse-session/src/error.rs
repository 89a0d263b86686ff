//! Error types for the session layer.

use gatehouse_protocol::AccountId;
use gatehouse_store::StoreError;

use crate::{SessionId, SessionStatus};

/// Errors raised while authenticating or driving a session.
///
/// Variants fall in three groups the gateway treats differently:
/// credential rejections the client is told about, malformed input that
/// ends the session silently, and operational failures that are logged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No account has the submitted name.
    #[error("unknown account {0:?}")]
    UnknownAccount(String),

    /// The account lookup itself failed.
    #[error("account lookup failed: {0}")]
    AccountLookup(#[source] StoreError),

    /// Any other repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The password does not match the stored hash.
    #[error("wrong password")]
    WrongPassword,

    /// The stored hash could not be parsed or checked.
    #[error("password verification failed: {0}")]
    Verification(String),

    /// Another session already holds the account. That session has been
    /// closed as well.
    #[error("account {0} is already logged in")]
    AlreadyLoggedIn(AccountId),

    /// The client asked for a credential scheme other than method 1.
    #[error("unsupported crypto method {0}")]
    UnsupportedCryptoMethod(u8),

    /// The password ciphertext does not decode with the session salt.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The session is not a registry member.
    #[error("{0} is not registered")]
    NotRegistered(SessionId),

    /// A transition tried to move a session backwards.
    #[error("session status cannot go from {from:?} to {to:?}")]
    StatusRegression {
        from: SessionStatus,
        to: SessionStatus,
    },
}

impl SessionError {
    /// Returns `true` if the client should be told "access denied".
    ///
    /// Unknown accounts and wrong passwords look the same from outside.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::UnknownAccount(_) | Self::AccountLookup(_) | Self::WrongPassword
        )
    }

    /// Returns `true` for backend or verification failures, as opposed to
    /// anything the client did.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::AccountLookup(_) | Self::Store(_) | Self::Verification(_)
        )
    }
}

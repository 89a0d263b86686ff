//! Login sessions for Gatehouse.
//!
//! This crate holds everything a connection task needs between reading
//! a decoded message and writing a reply:
//!
//! 1. **Credential decoding**: reversing the salt-keyed password
//!    obfuscation ([`crypto`]).
//! 2. **Authentication**: account lookup plus password verification
//!    ([`Authenticator`], [`PasswordVerifier`]).
//! 3. **Session state**: the per-connection protocol state machine
//!    ([`Session`], [`SessionStatus`]).
//! 4. **Exclusivity**: the process-wide table that keeps one live
//!    session per account ([`SessionRegistry`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)   ← drives sessions from a connection task
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol + Store (below)  ← message types, repository lookups
//! ```

pub mod crypto;

mod auth;
mod error;
mod password;
mod registry;
mod session;

pub use auth::{Authenticator, Identity, RepositoryAuthenticator};
pub use error::SessionError;
pub use password::{Argon2Verifier, PasswordVerifier};
pub use registry::{Registration, SessionRegistry};
pub use session::{Session, SessionId, SessionStatus};

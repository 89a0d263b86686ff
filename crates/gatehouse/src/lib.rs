//! # Gatehouse
//!
//! Login gateway for 1.29-era game clients.
//!
//! Gatehouse terminates client TCP connections, runs the login protocol,
//! checks credentials against a [`Repository`](gatehouse_store::Repository),
//! keeps one live session per account, and hands clients off to a game
//! server with a persisted ticket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! # async fn start() -> Result<(), GateError> {
//! let repo = MemoryRepository::load("fixtures.json")?;
//! let auth = RepositoryAuthenticator::new(repo.clone(), Argon2Verifier::new());
//! let server = GatehouseServerBuilder::new()
//!     .bind("0.0.0.0:5555")
//!     .build(repo, auth)
//!     .await?;
//! server.serve(CloseHandle::new()).await
//! # }
//! ```

mod directory;
mod error;
mod handler;
mod hosts;
mod server;

pub use error::GateError;
pub use hosts::{HostDirectory, host_list};
pub use server::{GatehouseServer, GatehouseServerBuilder, ServerConfig};

pub mod prelude {
    pub use crate::{
        GateError, GatehouseServer, GatehouseServerBuilder, HostDirectory,
        ServerConfig,
    };
    pub use gatehouse_protocol::{
        AccountId, GameServerId, HostList, HostState, UserId,
    };
    pub use gatehouse_session::{
        Argon2Verifier, Authenticator, PasswordVerifier,
        RepositoryAuthenticator, SessionError, SessionRegistry,
    };
    #[cfg(feature = "postgres")]
    pub use gatehouse_store::PgRepository;
    pub use gatehouse_store::{
        Account, Character, GameServer, MemoryRepository, Repository,
        StoreError, Ticket, User,
    };
    pub use gatehouse_transport::CloseHandle;
}

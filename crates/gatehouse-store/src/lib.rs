//! Persistence for the Gatehouse login gateway.
//!
//! The gateway never owns account data. It reads accounts, users,
//! characters and game servers, and writes exactly one thing: the
//! handoff [`Ticket`] issued when a client picks a game server.
//!
//! All access goes through the [`Repository`] trait. Two implementations
//! ship with the crate:
//!
//! - [`MemoryRepository`] — in-process tables, loadable from a JSON
//!   fixture file. Used by the tests and for local development.
//! - `PgRepository` — a PostgreSQL pool (feature `postgres`, on by
//!   default).

mod error;
mod memory;
mod model;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

pub use error::StoreError;
pub use memory::{Fixtures, MemoryRepository};
pub use model::{Account, Character, GameServer, Ticket, User};
#[cfg(feature = "postgres")]
pub use postgres::PgRepository;
pub use repository::Repository;

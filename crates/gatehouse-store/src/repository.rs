//! The repository seam between the gateway and its backend.

use std::future::Future;

use gatehouse_protocol::{AccountId, GameServerId, UserId};

use crate::{Account, Character, GameServer, StoreError, Ticket, User};

/// Filtered lookups over accounts, users, characters and game servers,
/// plus ticket creation.
///
/// Pure data access: no business rules live here. Single-record lookups
/// return [`StoreError::NotFound`] when nothing matches; multi-record
/// lookups return an empty `Vec` instead.
///
/// # Trait bounds
///
/// - `Clone` → every connection task holds its own handle; clones share
///   the same backend (a pool, or shared tables).
/// - `Send + Sync + 'static` → handles move into spawned tasks, and the
///   returned futures are `Send` so Tokio may poll them on any worker.
pub trait Repository: Clone + Send + Sync + 'static {
    /// Looks up an account by its login name.
    fn account_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Looks up an account by id.
    fn account_by_id(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Lists every account owned by a user.
    fn accounts_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    /// Looks up a user by id.
    fn user_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Looks up a user by nickname.
    fn user_by_nickname(
        &self,
        nickname: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Lists every character of an account.
    fn characters_by_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<Character>, StoreError>> + Send;

    /// Looks up a game server by id.
    fn game_server(
        &self,
        id: GameServerId,
    ) -> impl Future<Output = Result<GameServer, StoreError>> + Send;

    /// Lists every game server, ordered by id.
    fn game_servers(
        &self,
    ) -> impl Future<Output = Result<Vec<GameServer>, StoreError>> + Send;

    /// Persists a new ticket.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if a ticket with the same id exists.
    fn create_ticket(
        &self,
        ticket: &Ticket,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

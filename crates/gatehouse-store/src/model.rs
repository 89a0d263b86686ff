//! Records owned by the persistence backend.

use std::fmt;

use chrono::{DateTime, Utc};
use gatehouse_protocol::{AccountId, GameServerId, HostState, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A game account. One user may own several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub user_id: UserId,
    #[serde(default)]
    pub admin: bool,
    /// End of the paid subscription. In the past when there is none.
    #[serde(default)]
    pub subscribed_until: DateTime<Utc>,
}

/// The person behind one or more accounts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Argon2id hash in PHC string format.
    pub password_hash: String,
    pub nickname: String,
    #[serde(default)]
    pub community: i32,
    #[serde(default)]
    pub question: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("password_hash", &"[HASH]")
            .field("nickname", &self.nickname)
            .field("community", &self.community)
            .finish_non_exhaustive()
    }
}

/// A character on a game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i32,
    pub name: String,
    pub account_id: AccountId,
    pub game_server_id: GameServerId,
}

/// A game-world server clients can be handed off to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServer {
    pub id: GameServerId,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub state: HostState,
    /// Population level, 0 (low) to 3 (full).
    #[serde(default)]
    pub completion: u8,
}

/// Proof that an account may connect to one game server.
///
/// Created once per server selection and never mutated; the game server
/// consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub account_id: AccountId,
    pub game_server_id: GameServerId,
    pub created: DateTime<Utc>,
}

impl Ticket {
    /// Issues a ticket with a fresh random id, stamped now.
    pub fn issue(account_id: AccountId, game_server_id: GameServerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            game_server_id,
            created: Utc::now(),
        }
    }
}

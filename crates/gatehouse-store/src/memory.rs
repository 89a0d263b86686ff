//! In-memory repository.
//!
//! Tables live behind one `RwLock`; no lock is held across an `.await`
//! (the methods never await), so the returned futures stay `Send`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use gatehouse_protocol::{AccountId, GameServerId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Account, Character, GameServer, Repository, StoreError, Ticket, User,
};

/// The contents of a fixture file.
///
/// ```json
/// {
///   "users": [{ "id": 1, "password_hash": "$argon2id$...", "nickname": "Alice" }],
///   "accounts": [{ "id": 1, "name": "alice", "user_id": 1 }],
///   "game_servers": [{ "id": 1, "host": "127.0.0.1", "port": 5556, "state": "online" }],
///   "characters": [{ "id": 1, "name": "Ali", "account_id": 1, "game_server_id": 1 }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub game_servers: Vec<GameServer>,
    #[serde(default)]
    pub characters: Vec<Character>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    accounts: HashMap<AccountId, Account>,
    game_servers: BTreeMap<GameServerId, GameServer>,
    characters: Vec<Character>,
    tickets: HashMap<Uuid, Ticket>,
}

/// A [`Repository`] backed by process memory. Clones share the tables.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given records.
    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        let repo = Self::new();
        for user in fixtures.users {
            repo.insert_user(user);
        }
        for account in fixtures.accounts {
            repo.insert_account(account);
        }
        for server in fixtures.game_servers {
            repo.insert_game_server(server);
        }
        for character in fixtures.characters {
            repo.insert_character(character);
        }
        repo
    }

    /// Parses fixtures from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let fixtures: Fixtures = serde_json::from_str(json)?;
        Ok(Self::from_fixtures(fixtures))
    }

    /// Reads fixtures from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Inserts or replaces a user.
    pub fn insert_user(&self, user: User) {
        self.tables.write().users.insert(user.id, user);
    }

    /// Inserts or replaces an account.
    pub fn insert_account(&self, account: Account) {
        self.tables.write().accounts.insert(account.id, account);
    }

    /// Inserts or replaces a game server.
    pub fn insert_game_server(&self, server: GameServer) {
        self.tables.write().game_servers.insert(server.id, server);
    }

    /// Appends a character.
    pub fn insert_character(&self, character: Character) {
        self.tables.write().characters.push(character);
    }

    /// Returns every ticket created so far.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tables.read().tickets.values().cloned().collect()
    }
}

impl Repository for MemoryRepository {
    async fn account_by_name(&self, name: &str) -> Result<Account, StoreError> {
        self.tables
            .read()
            .accounts
            .values()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("account name {name:?}")))
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        self.tables
            .read()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("account {id}")))
    }

    async fn accounts_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Account>, StoreError> {
        let tables = self.tables.read();
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    async fn user_by_nickname(&self, nickname: &str) -> Result<User, StoreError> {
        self.tables
            .read()
            .users
            .values()
            .find(|u| u.nickname == nickname)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(format!("user nickname {nickname:?}"))
            })
    }

    async fn characters_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, StoreError> {
        Ok(self
            .tables
            .read()
            .characters
            .iter()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn game_server(&self, id: GameServerId) -> Result<GameServer, StoreError> {
        self.tables
            .read()
            .game_servers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("game server {id}")))
    }

    async fn game_servers(&self) -> Result<Vec<GameServer>, StoreError> {
        Ok(self.tables.read().game_servers.values().cloned().collect())
    }

    async fn create_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.tickets.contains_key(&ticket.id) {
            return Err(StoreError::Conflict(format!("ticket {}", ticket.id)));
        }
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }
}

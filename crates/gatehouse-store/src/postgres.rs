//! PostgreSQL repository.
//!
//! Queries are checked at runtime, not compile time, so building the
//! crate never needs a live database. The schema lives in
//! `sql/schema.sql`.

use chrono::{DateTime, Utc};
use gatehouse_protocol::{AccountId, GameServerId, HostState, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::{
    Account, Character, GameServer, Repository, StoreError, Ticket, User,
};

const MAX_CONNECTIONS: u32 = 8;

#[derive(FromRow)]
struct AccountRow {
    id: i32,
    name: String,
    user_id: i32,
    admin: bool,
    subscribed_until: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: AccountId(row.id),
            name: row.name,
            user_id: UserId(row.user_id),
            admin: row.admin,
            subscribed_until: row.subscribed_until,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    password_hash: String,
    nickname: String,
    community: i32,
    question: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            password_hash: row.password_hash,
            nickname: row.nickname,
            community: row.community,
            question: row.question,
        }
    }
}

#[derive(FromRow)]
struct CharacterRow {
    id: i32,
    name: String,
    account_id: i32,
    game_server_id: i32,
}

impl From<CharacterRow> for Character {
    fn from(row: CharacterRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            account_id: AccountId(row.account_id),
            game_server_id: GameServerId(row.game_server_id),
        }
    }
}

#[derive(FromRow)]
struct GameServerRow {
    id: i32,
    host: String,
    port: i32,
    state: i16,
    completion: i16,
}

impl TryFrom<GameServerRow> for GameServer {
    type Error = StoreError;

    fn try_from(row: GameServerRow) -> Result<Self, Self::Error> {
        let port = u16::try_from(row.port).map_err(|_| {
            StoreError::Corrupt(format!("game server {}: port {}", row.id, row.port))
        })?;
        let state = match row.state {
            0 => HostState::Offline,
            1 => HostState::Online,
            2 => HostState::Saving,
            other => {
                return Err(StoreError::Corrupt(format!(
                    "game server {}: state {other}",
                    row.id
                )));
            }
        };
        let completion = u8::try_from(row.completion).map_err(|_| {
            StoreError::Corrupt(format!(
                "game server {}: completion {}",
                row.id, row.completion
            ))
        })?;
        Ok(Self {
            id: GameServerId(row.id),
            host: row.host,
            port,
            state,
            completion,
        })
    }
}

/// A [`Repository`] over a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Opens a pool against `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        tracing::info!(max_connections = MAX_CONNECTIONS, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Repository for PgRepository {
    async fn account_by_name(&self, name: &str) -> Result<Account, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, user_id, admin, subscribed_until \
             FROM accounts WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::from)
        .ok_or_else(|| StoreError::not_found(format!("account name {name:?}")))
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, user_id, admin, subscribed_until \
             FROM accounts WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::from)
        .ok_or_else(|| StoreError::not_found(format!("account {id}")))
    }

    async fn accounts_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, user_id, admin, subscribed_until \
             FROM accounts WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, password_hash, nickname, community, question \
             FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    async fn user_by_nickname(&self, nickname: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, password_hash, nickname, community, question \
             FROM users WHERE nickname = $1",
        )
        .bind(nickname)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| StoreError::not_found(format!("user nickname {nickname:?}")))
    }

    async fn characters_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, StoreError> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            "SELECT id, name, account_id, game_server_id \
             FROM characters WHERE account_id = $1",
        )
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Character::from).collect())
    }

    async fn game_server(&self, id: GameServerId) -> Result<GameServer, StoreError> {
        sqlx::query_as::<_, GameServerRow>(
            "SELECT id, host, port, state, completion \
             FROM game_servers WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("game server {id}")))?
        .try_into()
    }

    async fn game_servers(&self) -> Result<Vec<GameServer>, StoreError> {
        let rows = sqlx::query_as::<_, GameServerRow>(
            "SELECT id, host, port, state, completion \
             FROM game_servers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(GameServer::try_from).collect()
    }

    async fn create_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tickets (id, account_id, game_server_id, created) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(ticket.id)
        .bind(ticket.account_id.0)
        .bind(ticket.game_server_id.0)
        .bind(ticket.created)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict(format!("ticket {}", ticket.id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(port: i32, state: i16, completion: i16) -> GameServerRow {
        GameServerRow {
            id: 7,
            host: "10.0.0.7".into(),
            port,
            state,
            completion,
        }
    }

    #[test]
    fn test_game_server_row_converts() {
        let server = GameServer::try_from(row(5556, 1, 2)).unwrap();
        assert_eq!(server.id, GameServerId(7));
        assert_eq!(server.port, 5556);
        assert_eq!(server.state, HostState::Online);
        assert_eq!(server.completion, 2);
    }

    #[test]
    fn test_game_server_row_bad_port_is_corrupt() {
        let err = GameServer::try_from(row(70_000, 1, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_game_server_row_unknown_state_is_corrupt() {
        let err = GameServer::try_from(row(5556, 9, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}

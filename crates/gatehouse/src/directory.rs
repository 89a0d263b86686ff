//! Character directory lookups and ticket issuance.
//!
//! These are the three things a logged-in client can ask for: where a
//! friend plays, where it has characters itself, and a ticket to one
//! game server.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gatehouse_protocol::{AccountId, GameServerId, ServerCharacters};
use gatehouse_store::{Character, GameServer, Repository, StoreError, Ticket};

/// Counts characters per game server, sorted by server id.
pub(crate) fn count_by_server<'a>(
    characters: impl IntoIterator<Item = &'a Character>,
) -> Vec<ServerCharacters> {
    let mut counts: BTreeMap<GameServerId, u32> = BTreeMap::new();
    for character in characters {
        *counts.entry(character.game_server_id).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(server_id, count)| ServerCharacters { server_id, count })
        .collect()
}

/// Milliseconds from `now` until `until`, or zero if it already passed.
pub(crate) fn subscription_remaining_ms(
    until: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u64 {
    u64::try_from((until - now).num_milliseconds()).unwrap_or(0)
}

/// Per-server character counts across every account of the user with
/// this nickname. An unknown nickname yields an empty list.
pub(crate) async fn search_friend<R: Repository>(
    repo: &R,
    nickname: &str,
) -> Result<Vec<ServerCharacters>, StoreError> {
    let user = match repo.user_by_nickname(nickname).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut characters = Vec::new();
    for account in repo.accounts_by_user(user.id).await? {
        characters.extend(repo.characters_by_account(account.id).await?);
    }
    Ok(count_by_server(&characters))
}

/// The bound account's remaining subscription and its per-server
/// character counts.
pub(crate) async fn servers_list<R: Repository>(
    repo: &R,
    account_id: AccountId,
) -> Result<(u64, Vec<ServerCharacters>), StoreError> {
    let account = repo.account_by_id(account_id).await?;
    let characters = repo.characters_by_account(account_id).await?;
    Ok((
        subscription_remaining_ms(account.subscribed_until, Utc::now()),
        count_by_server(&characters),
    ))
}

/// Persists a fresh ticket for `account_id` on `server_id` and returns
/// it with the server's address.
pub(crate) async fn issue_ticket<R: Repository>(
    repo: &R,
    account_id: AccountId,
    server_id: GameServerId,
) -> Result<(GameServer, Ticket), StoreError> {
    let server = repo.game_server(server_id).await?;
    let ticket = Ticket::issue(account_id, server_id);
    repo.create_ticket(&ticket).await?;
    tracing::info!(
        %account_id,
        game_server_id = %server_id,
        ticket_id = %ticket.id,
        "ticket issued"
    );
    Ok((server, ticket))
}

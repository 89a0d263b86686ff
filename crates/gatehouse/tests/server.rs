//! Integration tests for the Gatehouse server, handler, and full
//! connection flow over real loopback TCP.

use std::time::Duration;

use argon2::Params;
use futures_util::{SinkExt, StreamExt};
use gatehouse::prelude::*;
use gatehouse_session::crypto::encrypt_password;
use gatehouse_transport::FrameCodec;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

// =========================================================================
// Fixtures
// =========================================================================

const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(20);

fn verifier() -> Argon2Verifier {
    Argon2Verifier::with_params(Params::new(256, 1, 1, None).unwrap())
}

fn fixtures(verifier: &Argon2Verifier) -> MemoryRepository {
    let repo = MemoryRepository::new();
    let users = [
        (1, "hunter2", "Alice", 2, "first pet"),
        (2, "swordfish", "Bob", 0, "home town"),
    ];
    for (id, password, nickname, community, question) in users {
        repo.insert_user(User {
            id: UserId(id),
            password_hash: verifier.hash_password(password).unwrap(),
            nickname: nickname.into(),
            community,
            question: question.into(),
        });
    }
    repo.insert_account(Account {
        id: ALICE,
        name: "alice".into(),
        user_id: UserId(1),
        admin: true,
        subscribed_until: chrono_now_plus_days(30),
    });
    repo.insert_account(Account {
        id: BOB,
        name: "bob".into(),
        user_id: UserId(2),
        admin: false,
        subscribed_until: Default::default(),
    });
    for (id, state, completion) in [
        (1, HostState::Online, 0),
        (2, HostState::Offline, 0),
        (3, HostState::Online, 2),
    ] {
        repo.insert_game_server(GameServer {
            id: GameServerId(id),
            host: format!("127.0.0.{id}"),
            port: 5550 + id as u16,
            state,
            completion,
        });
    }
    for (id, account, server) in [(1, ALICE, 3), (2, ALICE, 1), (3, ALICE, 3), (4, BOB, 1)] {
        repo.insert_character(Character {
            id,
            name: format!("char{id}"),
            account_id: account,
            game_server_id: GameServerId(server),
        });
    }
    repo
}

fn chrono_now_plus_days(days: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() + chrono::Duration::days(days)
}

// =========================================================================
// Helpers
// =========================================================================

struct TestServer {
    addr: String,
    repo: MemoryRepository,
    registry: SessionRegistry,
    shutdown: CloseHandle,
    task: JoinHandle<Result<(), GateError>>,
}

/// Starts a server over the standard fixtures on a random port.
async fn start_server() -> TestServer {
    let verifier = verifier();
    let repo = fixtures(&verifier);
    let (addr, registry, shutdown, task) = serve_repo(repo.clone(), verifier).await;

    TestServer {
        addr,
        repo,
        registry,
        shutdown,
        task,
    }
}

/// Starts a server over any repository on a random port.
async fn serve_repo<R: Repository>(
    repo: R,
    verifier: Argon2Verifier,
) -> (
    String,
    SessionRegistry,
    CloseHandle,
    JoinHandle<Result<(), GateError>>,
) {
    let auth = RepositoryAuthenticator::new(repo.clone(), verifier);

    let server = GatehouseServerBuilder::new()
        .bind("127.0.0.1:0")
        .hosts_refresh(Duration::ZERO)
        .build(repo, auth)
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr").to_string();
    let registry = server.registry();
    let shutdown = CloseHandle::new();
    let task = tokio::spawn(server.serve(shutdown.clone()));

    (addr, registry, shutdown, task)
}

/// Fixtures whose account-by-name lookup always fails with a backend
/// error.
#[derive(Clone)]
struct BrokenAccounts(MemoryRepository);

impl Repository for BrokenAccounts {
    async fn account_by_name(&self, name: &str) -> Result<Account, StoreError> {
        Err(StoreError::Corrupt(format!("account {name:?}")))
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        self.0.account_by_id(id).await
    }

    async fn accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, StoreError> {
        self.0.accounts_by_user(user_id).await
    }

    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.0.user_by_id(id).await
    }

    async fn user_by_nickname(&self, nickname: &str) -> Result<User, StoreError> {
        self.0.user_by_nickname(nickname).await
    }

    async fn characters_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, StoreError> {
        self.0.characters_by_account(account_id).await
    }

    async fn game_server(&self, id: GameServerId) -> Result<GameServer, StoreError> {
        self.0.game_server(id).await
    }

    async fn game_servers(&self) -> Result<Vec<GameServer>, StoreError> {
        self.0.game_servers().await
    }

    async fn create_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        self.0.create_ticket(ticket).await
    }
}

struct Client {
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
    salt: String,
}

impl Client {
    /// Connects and reads the hello message.
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read, write) = stream.into_split();
        let mut client = Self {
            reader: FramedRead::new(read, FrameCodec::new()),
            writer: FramedWrite::new(write, FrameCodec::new()),
            salt: String::new(),
        };
        let hello = client.recv().await.expect("hello expected");
        client.salt = hello.strip_prefix("HC").expect("hello prefix").to_string();
        client
    }

    async fn send(&mut self, text: &str) {
        self.writer
            .send(text.as_bytes().to_vec())
            .await
            .expect("send should succeed");
    }

    /// Next frame, or `None` once the server closed the connection.
    async fn recv(&mut self) -> Option<String> {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .expect("server should answer or close");
        match frame {
            Some(Ok(bytes)) => Some(String::from_utf8(bytes).expect("ascii frame")),
            _ => None,
        }
    }

    async fn recv_n(&mut self, n: usize) -> Vec<String> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.recv().await.expect("frame expected"));
        }
        frames
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None, "connection should be closed");
    }

    /// Sends version, credential and the queue request.
    async fn submit(&mut self, version: &str, username: &str, password: &str) {
        let ciphertext = encrypt_password(password, &self.salt).unwrap();
        self.send(version).await;
        self.send(&format!("{username}\n#1{ciphertext}")).await;
        self.send("Af").await;
    }

    /// Logs in and consumes the six frames of a successful login.
    async fn login(&mut self, username: &str, password: &str) -> Vec<String> {
        self.submit("1.29.1", username, password).await;
        let frames = self.recv_n(6).await;
        assert!(frames[5].starts_with("AlK"), "login should succeed: {frames:?}");
        frames
    }
}

const QUEUE_NOTICE: &str = "Af1|0|1|0|0";
const HOSTS: &str = "AH1;1;0;1|2;0;0;0|3;1;2;1";

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should become true");
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_valid_credentials_sends_account_details() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.submit("1.29.0", "bob", "swordfish").await;
    let frames = client.recv_n(6).await;

    assert_eq!(
        frames,
        vec![QUEUE_NOTICE, "AdBob", "Ac0", "AQhome+town", HOSTS, "AlK0"]
    );
    assert!(server.registry.holder(BOB).is_some());
}

#[tokio::test]
async fn test_login_admin_account_is_authorized() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    let frames = client.login("alice", "hunter2").await;

    assert_eq!(frames[1], "AdAlice");
    assert_eq!(frames[2], "Ac2");
    assert_eq!(frames[5], "AlK1");
}

#[tokio::test]
async fn test_login_old_version_sends_bad_version_and_closes() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.submit("1.28.9", "bob", "swordfish").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    assert_eq!(client.recv().await.as_deref(), Some("AlEv^1.29.0"));
    client.expect_closed().await;
    assert_eq!(server.registry.holder(BOB), None);
}

#[tokio::test]
async fn test_login_other_major_version_is_rejected() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.submit("2.30.0", "bob", "swordfish").await;

    assert_eq!(client.recv_n(2).await[1], "AlEv^1.29.0");
    client.expect_closed().await;
}

#[tokio::test]
async fn test_login_wrong_password_sends_single_access_denied() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.submit("1.29.1", "bob", "letmein").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    assert_eq!(client.recv().await.as_deref(), Some("AlEf"));
    client.expect_closed().await;
}

#[tokio::test]
async fn test_login_unknown_account_looks_like_wrong_password() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.submit("1.29.1", "mallory", "hunter2").await;

    assert_eq!(client.recv_n(2).await[1], "AlEf");
    client.expect_closed().await;
}

#[tokio::test]
async fn test_login_unsupported_crypto_method_closes_silently() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.send("1.29.1").await;
    client.send("bob\n#2abcd").await;
    client.send("Af").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    client.expect_closed().await;
}

#[tokio::test]
async fn test_login_malformed_ciphertext_closes_silently() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.send("1.29.1").await;
    client.send("bob\n#1abc").await;
    client.send("Af").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    client.expect_closed().await;
}

#[tokio::test]
async fn test_queue_request_when_idle_only_resends_notice() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;

    client.send("Af").await;
    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));

    // Still logged in: a directory request is answered.
    client.send("Ax").await;
    assert!(client.recv().await.unwrap().starts_with("AxK"));
}

// =========================================================================
// Protocol order
// =========================================================================

#[tokio::test]
async fn test_command_before_login_is_protocol_violation() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.send("1.29.1").await;
    client.send("bob\n#1NI").await;
    client.send("Ax").await;

    client.expect_closed().await;
}

#[tokio::test]
async fn test_version_after_login_is_protocol_violation() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;

    client.send("1.29.1").await;

    client.expect_closed().await;
    wait_until(|| server.registry.holder(BOB).is_none()).await;
}

#[tokio::test]
async fn test_garbage_version_closes_connection() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.send("hello").await;

    client.expect_closed().await;
}

// =========================================================================
// Exclusivity
// =========================================================================

/// A second login for a bound account closes the holder AND refuses the
/// newcomer, leaving the account with no session. This mirrors the
/// deployed login server. "Kick the old session, accept the new one" may
/// be what was intended; change this test only with that confirmed.
#[tokio::test]
async fn test_double_login_evicts_holder_and_rejects_newcomer() {
    let server = start_server().await;
    let mut first = Client::connect(&server.addr).await;
    first.login("alice", "hunter2").await;

    let mut second = Client::connect(&server.addr).await;
    second.submit("1.29.1", "alice", "hunter2").await;

    assert_eq!(second.recv().await.as_deref(), Some(QUEUE_NOTICE));
    assert_eq!(second.recv().await.as_deref(), Some("AlEa"));
    second.expect_closed().await;
    first.expect_closed().await;

    wait_until(|| server.registry.holder(ALICE).is_none()).await;
}

#[tokio::test]
async fn test_login_after_eviction_settles_succeeds() {
    let server = start_server().await;
    let mut first = Client::connect(&server.addr).await;
    first.login("alice", "hunter2").await;

    let mut second = Client::connect(&server.addr).await;
    second.submit("1.29.1", "alice", "hunter2").await;
    second.recv_n(2).await;
    first.expect_closed().await;
    wait_until(|| server.registry.holder(ALICE).is_none()).await;

    let mut third = Client::connect(&server.addr).await;
    let frames = third.login("alice", "hunter2").await;
    assert_eq!(frames[5], "AlK1");
}

#[tokio::test]
async fn test_disconnect_releases_account() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;
    assert!(server.registry.holder(BOB).is_some());

    drop(client);

    wait_until(|| server.registry.is_empty()).await;
}

// =========================================================================
// Directory
// =========================================================================

#[tokio::test]
async fn test_select_server_persists_ticket_and_closes() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("alice", "hunter2").await;

    client.send("AX3").await;
    let reply = client.recv().await.expect("select reply");
    client.expect_closed().await;

    let tickets = server.repo.tickets();
    assert_eq!(tickets.len(), 1);
    let ticket = &tickets[0];
    assert_eq!(ticket.account_id, ALICE);
    assert_eq!(ticket.game_server_id, GameServerId(3));
    assert_eq!(reply, format!("AYK127.0.0.3:5553;{}", ticket.id));
}

#[tokio::test]
async fn test_select_unknown_server_closes_without_ticket() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("alice", "hunter2").await;

    client.send("AX99").await;

    client.expect_closed().await;
    assert!(server.repo.tickets().is_empty());
}

#[tokio::test]
async fn test_select_server_twice_issues_distinct_tickets() {
    let server = start_server().await;
    for _ in 0..2 {
        let mut client = Client::connect(&server.addr).await;
        client.login("bob", "swordfish").await;
        client.send("AX1").await;
        client.recv().await.expect("select reply");
        client.expect_closed().await;
        wait_until(|| server.registry.holder(BOB).is_none()).await;
    }

    let tickets = server.repo.tickets();
    assert_eq!(tickets.len(), 2);
    assert_ne!(tickets[0].id, tickets[1].id);
}

#[tokio::test]
async fn test_friend_search_unknown_nickname_returns_empty_list() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;

    client.send("AFnobody").await;
    assert_eq!(client.recv().await.as_deref(), Some("AF"));

    // Still idle.
    client.send("AFAlice").await;
    assert_eq!(client.recv().await.as_deref(), Some("AF1,1;3,2"));
}

#[tokio::test]
async fn test_servers_list_reports_subscription_and_counts() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("alice", "hunter2").await;

    client.send("Ax").await;
    let reply = client.recv().await.expect("servers list");

    let body = reply.strip_prefix("AxK").expect("servers list prefix");
    let (ms, servers) = body.split_once('|').expect("server entries");
    let ms: u64 = ms.parse().unwrap();
    assert!(ms > 29 * 24 * 3_600_000);
    assert_eq!(servers, "1,1|3,2");
}

#[tokio::test]
async fn test_servers_list_expired_subscription_is_zero() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;

    client.send("Ax").await;
    assert_eq!(client.recv().await.as_deref(), Some("AxK0|1,1"));
}

// =========================================================================
// Backend failures
// =========================================================================

#[tokio::test]
async fn test_login_account_lookup_failure_sends_access_denied_and_closes() {
    let verifier = verifier();
    let repo = BrokenAccounts(fixtures(&verifier));
    let (addr, registry, _shutdown, _task) = serve_repo(repo, verifier).await;
    let mut client = Client::connect(&addr).await;

    client.submit("1.29.1", "bob", "swordfish").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    assert_eq!(client.recv().await.as_deref(), Some("AlEf"));
    client.expect_closed().await;
    assert_eq!(registry.holder(BOB), None);
}

#[tokio::test]
async fn test_login_unusable_password_hash_closes_without_login_error() {
    let server = start_server().await;
    server.repo.insert_user(User {
        id: UserId(3),
        password_hash: "garbage".into(),
        nickname: "Carol".into(),
        community: 0,
        question: "first car".into(),
    });
    server.repo.insert_account(Account {
        id: AccountId(30),
        name: "carol".into(),
        user_id: UserId(3),
        admin: false,
        subscribed_until: Default::default(),
    });
    let mut client = Client::connect(&server.addr).await;

    client.submit("1.29.1", "carol", "whatever").await;

    assert_eq!(client.recv().await.as_deref(), Some(QUEUE_NOTICE));
    client.expect_closed().await;
    assert_eq!(server.registry.holder(AccountId(30)), None);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_live_sessions_and_returns() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    client.login("bob", "swordfish").await;

    server.shutdown.close();

    client.expect_closed().await;
    let result = tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("serve should return")
        .expect("serve should not panic");
    assert!(result.is_ok());
    assert!(server.registry.is_empty());
}

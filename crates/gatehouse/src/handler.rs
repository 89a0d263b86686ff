//! Per-connection handler: hello, login, and directory requests.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the session and send the salt
//!   2. Store the client version, then the credential
//!   3. On the first queue request, run the login
//!   4. Serve directory requests until a server is selected
//!
//! Every way out of the loop is an `Err(GateError)`; the variant only
//! decides the log level.

use std::sync::Arc;

use gatehouse_protocol::{
    ClientMessage, Codec, LoginErrorReason, MIN_CLIENT_VERSION, ProtocolError,
    QueueNotice, ServerMessage,
};
use gatehouse_session::crypto::decrypt_password;
use gatehouse_session::{
    Authenticator, Registration, Session, SessionError, SessionStatus,
};
use gatehouse_store::Repository;
use gatehouse_transport::{CloseHandle, Connection, TcpConnection};

use crate::GateError;
use crate::directory;
use crate::server::ServerState;

/// The only credential scheme 1.29 clients use.
const CRYPTO_METHOD: u8 = 1;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, A, C>(
    conn: TcpConnection,
    state: Arc<ServerState<R, A, C>>,
) where
    R: Repository,
    A: Authenticator,
    C: Codec,
{
    let closer = conn.close_handle();
    let mut session = Session::new(conn.peer_addr());
    let session_id = session.id();
    let peer = session.peer();

    // Dropped on every exit path, panics included.
    let registration = state.registry.register(session_id, closer.clone());
    tracing::info!(%session_id, %peer, conn_id = %conn.id(), "client connected");

    let result = run(&conn, &state, &mut session, &registration, &closer).await;
    session.terminate();

    match result {
        Ok(()) => {}
        Err(e) if e.is_disconnect() => {}
        Err(e) if e.is_operational() => {
            tracing::warn!(%session_id, %peer, error = %e, "session failed");
        }
        Err(e) => {
            tracing::debug!(%session_id, %peer, error = %e, "session rejected");
        }
    }

    let _ = conn.close().await;
    drop(registration);
    tracing::info!(
        %session_id,
        %peer,
        account_id = ?session.account_id(),
        "client disconnected"
    );
}

/// The message loop. Returns `Ok(())` when the peer goes away or the
/// connection is closed from outside.
async fn run<R, A, C>(
    conn: &TcpConnection,
    state: &ServerState<R, A, C>,
    session: &mut Session,
    registration: &Registration,
    closer: &CloseHandle,
) -> Result<(), GateError>
where
    R: Repository,
    A: Authenticator,
    C: Codec,
{
    send(
        conn,
        &state.codec,
        ServerMessage::HelloConnect {
            salt: session.salt().to_string(),
        },
    )
    .await?;

    loop {
        let Some(frame) = conn.recv().await? else {
            return Ok(());
        };
        let msg = state.codec.decode(&frame, session.status().phase())?;
        tracing::trace!(session_id = %session.id(), msg = msg.name(), "received");

        tokio::select! {
            biased;
            _ = closer.closed() => return Ok(()),
            handled = dispatch(conn, state, session, registration, msg) => handled?,
        }
    }
}

/// Routes one message according to the session status. Anything that
/// does not fit the status ends the session.
async fn dispatch<R, A, C>(
    conn: &TcpConnection,
    state: &ServerState<R, A, C>,
    session: &mut Session,
    registration: &Registration,
    msg: ClientMessage,
) -> Result<(), GateError>
where
    R: Repository,
    A: Authenticator,
    C: Codec,
{
    match (session.status(), msg) {
        (SessionStatus::AwaitingVersion, ClientMessage::AccountVersion(version)) => {
            session.store_version(version)?;
        }

        (SessionStatus::AwaitingCredential, ClientMessage::AccountCredential(credential)) => {
            session.store_credential(credential)?;
        }

        (
            status @ (SessionStatus::AwaitingQueueAck | SessionStatus::Idle),
            ClientMessage::AccountQueuePosition,
        ) => {
            send(conn, &state.codec, ServerMessage::Queue(QueueNotice::placeholder()))
                .await?;
            if status == SessionStatus::AwaitingQueueAck {
                login(conn, state, session, registration).await?;
            }
        }

        (SessionStatus::Idle, ClientMessage::AccountSearchForFriend { nickname }) => {
            let servers = directory::search_friend(&state.repo, &nickname).await?;
            send(conn, &state.codec, ServerMessage::FriendServerList { servers })
                .await?;
        }

        (SessionStatus::Idle, ClientMessage::AccountGetServersList) => {
            let account_id = bound_account(session)?;
            let (subscription_ms, servers) =
                directory::servers_list(&state.repo, account_id).await?;
            send(
                conn,
                &state.codec,
                ServerMessage::ServersList {
                    subscription_ms,
                    servers,
                },
            )
            .await?;
        }

        (SessionStatus::Idle, ClientMessage::AccountSetServer { id }) => {
            let account_id = bound_account(session)?;
            let (server, ticket) =
                directory::issue_ticket(&state.repo, account_id, id).await?;
            send(
                conn,
                &state.codec,
                ServerMessage::SelectServer {
                    host: server.host,
                    port: server.port,
                    ticket: ticket.id.to_string(),
                },
            )
            .await?;
            return Err(GateError::EndOfService);
        }

        (status, msg) => {
            return Err(ProtocolError::UnexpectedMessage(format!(
                "{} while {status:?}",
                msg.name()
            ))
            .into());
        }
    }
    Ok(())
}

/// Runs the login gates in order. Every refusal ends the session.
async fn login<R, A, C>(
    conn: &TcpConnection,
    state: &ServerState<R, A, C>,
    session: &mut Session,
    registration: &Registration,
) -> Result<(), GateError>
where
    R: Repository,
    A: Authenticator,
    C: Codec,
{
    let session_id = session.id();
    let (Some(version), Some(credential)) =
        (session.version(), session.credential().cloned())
    else {
        return Err(GateError::EndOfService);
    };

    if !version.is_supported() {
        send(
            conn,
            &state.codec,
            ServerMessage::LoginError {
                reason: LoginErrorReason::BadVersion,
                extra: format!("^{MIN_CLIENT_VERSION}"),
            },
        )
        .await?;
        tracing::debug!(%session_id, %version, "unsupported client version");
        return Err(GateError::EndOfService);
    }

    if credential.crypto_method != CRYPTO_METHOD {
        return Err(SessionError::UnsupportedCryptoMethod(credential.crypto_method).into());
    }

    let password = decrypt_password(&credential.ciphertext, session.salt())?;

    let identity = match state.auth.authenticate(&credential.username, &password).await {
        Ok(identity) => identity,
        Err(e) => {
            if e.is_access_denied() {
                send_login_error(conn, &state.codec, LoginErrorReason::AccessDenied).await?;
            }
            return Err(e.into());
        }
    };
    let account_id = identity.account.id;

    if let Err(e) = registration.claim(account_id) {
        if matches!(e, SessionError::AlreadyLoggedIn(_)) {
            send_login_error(conn, &state.codec, LoginErrorReason::AlreadyLoggedIn)
                .await?;
        }
        return Err(e.into());
    }
    session.bind_account(account_id)?;
    tracing::info!(%session_id, %account_id, "login succeeded");

    let hosts = state.hosts.current();
    for msg in [
        ServerMessage::Pseudo {
            nickname: identity.user.nickname,
        },
        ServerMessage::Community {
            id: identity.user.community,
        },
        ServerMessage::SecretQuestion {
            question: identity.user.question,
        },
        ServerMessage::Hosts(hosts.as_ref().clone()),
        ServerMessage::LoginSuccess {
            authorized: identity.account.admin,
        },
    ] {
        send(conn, &state.codec, msg).await?;
    }
    Ok(())
}

fn bound_account(session: &Session) -> Result<gatehouse_protocol::AccountId, GateError> {
    session.account_id().ok_or_else(|| {
        ProtocolError::UnexpectedMessage("no account bound".into()).into()
    })
}

async fn send_login_error(
    conn: &TcpConnection,
    codec: &impl Codec,
    reason: LoginErrorReason,
) -> Result<(), GateError> {
    send(
        conn,
        codec,
        ServerMessage::LoginError {
            reason,
            extra: String::new(),
        },
    )
    .await
}

async fn send(
    conn: &TcpConnection,
    codec: &impl Codec,
    msg: ServerMessage,
) -> Result<(), GateError> {
    let bytes = codec.encode(&msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

//! Codec trait and the text codec spoken by game clients.
//!
//! A "codec" converts between messages and frame bytes. Framing itself
//! (finding where a frame ends) is the transport's job; a codec only ever
//! sees one complete frame.
//!
//! Client frames are not self-describing at the start of a session: the
//! version and the credential are sent bare, without a message prefix.
//! The caller therefore tells the codec which [`Phase`] the session is in.

use std::fmt::Write as _;

use crate::types::{
    ClientMessage, ClientVersion, Credential, GameServerId, HostList,
    ServerCharacters, ServerMessage,
};
use crate::ProtocolError;

/// How the next client frame must be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A bare version string, e.g. `1.29.1`.
    Version,
    /// A bare credential, `username\n#<method><ciphertext>`.
    Credential,
    /// A prefixed command such as `Af` or `AX3`.
    Command,
}

/// Encodes server messages and decodes client frames.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a server message into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if a text field contains a byte the
    /// framing reserves.
    fn encode(&self, msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one client frame as the message `phase` expects.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for malformed frames and
    /// `ProtocolError::UnknownMessage` for unhandled command prefixes.
    fn decode(
        &self,
        frame: &[u8],
        phase: Phase,
    ) -> Result<ClientMessage, ProtocolError>;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The ASCII codec used by 1.29-era game clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
        let text = match msg {
            ServerMessage::HelloConnect { salt } => format!("HC{salt}"),
            ServerMessage::LoginError { reason, extra } => {
                format!("AlE{}{extra}", reason.code())
            }
            ServerMessage::Pseudo { nickname } => format!("Ad{nickname}"),
            ServerMessage::Community { id } => format!("Ac{id}"),
            ServerMessage::SecretQuestion { question } => {
                format!("AQ{}", question.replace(' ', "+"))
            }
            ServerMessage::Hosts(hosts) => format!("AH{}", encode_hosts(hosts)),
            ServerMessage::LoginSuccess { authorized } => {
                format!("AlK{}", u8::from(*authorized))
            }
            ServerMessage::Queue(q) => format!(
                "Af{}|{}|{}|{}|{}",
                q.position,
                q.total_subscribers,
                q.total_non_subscribers,
                u8::from(q.subscriber),
                q.queue_id
            ),
            ServerMessage::FriendServerList { servers } => {
                let entries: Vec<String> = servers
                    .iter()
                    .map(|s| format!("{},{}", s.server_id.0, s.count))
                    .collect();
                format!("AF{}", entries.join(";"))
            }
            ServerMessage::ServersList {
                subscription_ms,
                servers,
            } => {
                let mut text = format!("AxK{subscription_ms}");
                for ServerCharacters { server_id, count } in servers {
                    // Writing to a String cannot fail.
                    let _ = write!(text, "|{},{count}", server_id.0);
                }
                text
            }
            ServerMessage::SelectServer { host, port, ticket } => {
                format!("AYK{host}:{port};{ticket}")
            }
        };

        if text.contains('\0') {
            return Err(ProtocolError::Encode(
                "message contains a NUL byte".into(),
            ));
        }
        Ok(text.into_bytes())
    }

    fn decode(
        &self,
        frame: &[u8],
        phase: Phase,
    ) -> Result<ClientMessage, ProtocolError> {
        let text = std::str::from_utf8(frame)
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;

        match phase {
            Phase::Version => {
                text.parse::<ClientVersion>().map(ClientMessage::AccountVersion)
            }
            Phase::Credential => {
                decode_credential(text).map(ClientMessage::AccountCredential)
            }
            Phase::Command => decode_command(text),
        }
    }
}

fn encode_hosts(hosts: &HostList) -> String {
    hosts
        .entries
        .iter()
        .map(|h| {
            format!(
                "{};{};{};{}",
                h.id.0,
                h.state.code(),
                h.completion,
                u8::from(h.can_log)
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn decode_credential(text: &str) -> Result<Credential, ProtocolError> {
    let (username, rest) = text.split_once('\n').ok_or_else(|| {
        ProtocolError::Decode("credential has no password line".into())
    })?;
    if username.is_empty() {
        return Err(ProtocolError::Decode("empty username".into()));
    }

    let rest = rest.strip_prefix('#').ok_or_else(|| {
        ProtocolError::Decode("password line must start with '#'".into())
    })?;
    let mut chars = rest.chars();
    let crypto_method = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| ProtocolError::Decode("missing crypto method".into()))?;

    Ok(Credential {
        username: username.to_string(),
        ciphertext: chars.as_str().to_string(),
        // A single decimal digit always fits.
        crypto_method: crypto_method as u8,
    })
}

fn decode_command(text: &str) -> Result<ClientMessage, ProtocolError> {
    let Some(prefix) = text.get(..2) else {
        return Err(ProtocolError::UnknownMessage(text.to_string()));
    };
    let body = &text[2..];

    match prefix {
        "Af" => Ok(ClientMessage::AccountQueuePosition),
        "AF" => Ok(ClientMessage::AccountSearchForFriend {
            nickname: body.to_string(),
        }),
        "Ax" => Ok(ClientMessage::AccountGetServersList),
        "AX" => {
            let id = body.parse().map_err(|_| {
                ProtocolError::Decode(format!("invalid server id {body:?}"))
            })?;
            Ok(ClientMessage::AccountSetServer {
                id: GameServerId(id),
            })
        }
        other => Err(ProtocolError::UnknownMessage(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        HostEntry, HostState, LoginErrorReason, QueueNotice,
    };

    fn encode(msg: ServerMessage) -> String {
        String::from_utf8(TextCodec.encode(&msg).expect("encode")).unwrap()
    }

    fn decode(frame: &str, phase: Phase) -> Result<ClientMessage, ProtocolError> {
        TextCodec.decode(frame.as_bytes(), phase)
    }

    // =====================================================================
    // decode()
    // =====================================================================

    #[test]
    fn test_decode_version_phase_parses_version() {
        let msg = decode("1.29.1", Phase::Version).unwrap();
        assert_eq!(
            msg,
            ClientMessage::AccountVersion(ClientVersion {
                major: 1,
                minor: 29,
                patch: 1
            })
        );
    }

    #[test]
    fn test_decode_version_phase_rejects_command() {
        // A client that skips the version goes straight to a command;
        // that must not be mistaken for anything valid.
        assert!(matches!(
            decode("Af", Phase::Version),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_credential_splits_fields() {
        let msg = decode("alice\n#1abcDEF-_", Phase::Credential).unwrap();
        assert_eq!(
            msg,
            ClientMessage::AccountCredential(Credential {
                username: "alice".into(),
                ciphertext: "abcDEF-_".into(),
                crypto_method: 1,
            })
        );
    }

    #[test]
    fn test_decode_credential_keeps_unsupported_method() {
        // The method is validated during login, not while decoding.
        let msg = decode("bob\n#2xyz", Phase::Credential).unwrap();
        match msg {
            ClientMessage::AccountCredential(c) => assert_eq!(c.crypto_method, 2),
            other => panic!("expected credential, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_credential_rejects_malformed() {
        for input in ["alice", "\n#1abc", "alice\n1abc", "alice\n#", "alice\n#xabc"] {
            assert!(
                decode(input, Phase::Credential).is_err(),
                "{input:?} should not decode"
            );
        }
    }

    #[test]
    fn test_decode_command_prefixes() {
        assert_eq!(
            decode("Af", Phase::Command).unwrap(),
            ClientMessage::AccountQueuePosition
        );
        assert_eq!(
            decode("AFbob", Phase::Command).unwrap(),
            ClientMessage::AccountSearchForFriend {
                nickname: "bob".into()
            }
        );
        assert_eq!(
            decode("Ax", Phase::Command).unwrap(),
            ClientMessage::AccountGetServersList
        );
        assert_eq!(
            decode("AX3", Phase::Command).unwrap(),
            ClientMessage::AccountSetServer {
                id: GameServerId(3)
            }
        );
    }

    #[test]
    fn test_decode_command_unknown_prefix_returns_error() {
        assert!(matches!(
            decode("Zz", Phase::Command),
            Err(ProtocolError::UnknownMessage(p)) if p == "Zz"
        ));
        assert!(matches!(
            decode("A", Phase::Command),
            Err(ProtocolError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_decode_set_server_invalid_id_returns_error() {
        assert!(matches!(
            decode("AXthree", Phase::Command),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_returns_error() {
        let result = TextCodec.decode(&[0xff, 0xfe], Phase::Command);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    // =====================================================================
    // encode()
    // =====================================================================

    #[test]
    fn test_encode_login_errors() {
        assert_eq!(
            encode(ServerMessage::LoginError {
                reason: LoginErrorReason::BadVersion,
                extra: "^1.29.0".into(),
            }),
            "AlEv^1.29.0"
        );
        assert_eq!(
            encode(ServerMessage::LoginError {
                reason: LoginErrorReason::AccessDenied,
                extra: String::new(),
            }),
            "AlEf"
        );
        assert_eq!(
            encode(ServerMessage::LoginError {
                reason: LoginErrorReason::AlreadyLoggedIn,
                extra: String::new(),
            }),
            "AlEa"
        );
    }

    #[test]
    fn test_encode_account_details() {
        assert_eq!(
            encode(ServerMessage::Pseudo {
                nickname: "Alice".into()
            }),
            "AdAlice"
        );
        assert_eq!(encode(ServerMessage::Community { id: 2 }), "Ac2");
        assert_eq!(
            encode(ServerMessage::SecretQuestion {
                question: "first pet name".into()
            }),
            "AQfirst+pet+name"
        );
        assert_eq!(
            encode(ServerMessage::LoginSuccess { authorized: true }),
            "AlK1"
        );
    }

    #[test]
    fn test_encode_queue_placeholder() {
        assert_eq!(
            encode(ServerMessage::Queue(QueueNotice::placeholder())),
            "Af1|0|1|0|0"
        );
    }

    #[test]
    fn test_encode_hosts() {
        let hosts = HostList {
            entries: vec![
                HostEntry {
                    id: GameServerId(1),
                    state: HostState::Online,
                    completion: 0,
                    can_log: true,
                },
                HostEntry {
                    id: GameServerId(3),
                    state: HostState::Offline,
                    completion: 2,
                    can_log: false,
                },
            ],
        };
        assert_eq!(encode(ServerMessage::Hosts(hosts)), "AH1;1;0;1|3;0;2;0");
        assert_eq!(encode(ServerMessage::Hosts(HostList::default())), "AH");
    }

    #[test]
    fn test_encode_server_lists() {
        let servers = vec![
            ServerCharacters {
                server_id: GameServerId(1),
                count: 2,
            },
            ServerCharacters {
                server_id: GameServerId(4),
                count: 1,
            },
        ];
        assert_eq!(
            encode(ServerMessage::FriendServerList {
                servers: servers.clone()
            }),
            "AF1,2;4,1"
        );
        assert_eq!(
            encode(ServerMessage::FriendServerList { servers: vec![] }),
            "AF"
        );
        assert_eq!(
            encode(ServerMessage::ServersList {
                subscription_ms: 5000,
                servers,
            }),
            "AxK5000|1,2|4,1"
        );
    }

    #[test]
    fn test_encode_select_server() {
        assert_eq!(
            encode(ServerMessage::SelectServer {
                host: "10.0.0.3".into(),
                port: 5556,
                ticket: "t-1".into(),
            }),
            "AYK10.0.0.3:5556;t-1"
        );
    }

    #[test]
    fn test_encode_rejects_nul_in_text() {
        let result = TextCodec.encode(&ServerMessage::Pseudo {
            nickname: "a\0b".into(),
        });
        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }
}

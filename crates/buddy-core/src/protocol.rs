//! Wire protocol between the buddy client and the matchmaking server.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`. Outbound frames are
//! [`ClientMessage`]s, inbound frames are [`ServerMessage`]s. Inbound frames
//! are decoded through [`parse_server_frame`], which rejects unknown event
//! names instead of passing an untyped payload along.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::{Chat, ChatId, UserId};

/// Event name for [`ClientMessage::Join`].
pub const EVENT_JOIN: &str = "join";
/// Event name for [`ServerMessage::Joined`].
pub const EVENT_JOINED: &str = "joined";
/// Event name for [`ServerMessage::ChatRestore`].
pub const EVENT_CHAT_RESTORE: &str = "chat-restore";
/// Event name for [`ServerMessage::ChatClosed`].
pub const EVENT_CHAT_CLOSED: &str = "chat-closed";
/// Event name for [`ServerMessage::Inactive`].
pub const EVENT_INACTIVE: &str = "inactive";

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Declare search intent (sent on every transport `connect`).
    #[serde(rename = "join", rename_all = "camelCase")]
    Join { login_id: String, email: String },
}

impl ClientMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => EVENT_JOIN,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Two users were paired into a new chat.
    #[serde(rename = "joined", rename_all = "camelCase")]
    Joined {
        room_id: ChatId,
        user_ids: Vec<UserId>,
    },

    /// Session rehydration after a reconnect. `chats` keeps the order the
    /// server listed them in.
    #[serde(rename = "chat-restore", rename_all = "camelCase")]
    ChatRestore {
        chats: IndexMap<ChatId, Chat>,
        current_chat_id: Option<ChatId>,
    },

    /// A chat was closed. `None` means "whichever chat is active".
    #[serde(rename = "chat-closed")]
    ChatClosed(Option<ChatId>),

    /// The server considers this client idle; all chats are gone.
    #[serde(rename = "inactive")]
    Inactive,
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Joined { .. } => EVENT_JOINED,
            ServerMessage::ChatRestore { .. } => EVENT_CHAT_RESTORE,
            ServerMessage::ChatClosed(_) => EVENT_CHAT_CLOSED,
            ServerMessage::Inactive => EVENT_INACTIVE,
        }
    }

    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Inbound decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope {
    event: String,
}

#[derive(Deserialize)]
struct Payload<T> {
    data: T,
}

#[derive(Deserialize)]
struct OptionalChatId {
    #[serde(default)]
    data: Option<ChatId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinedData {
    room_id: ChatId,
    user_ids: Vec<UserId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreData {
    chats: IndexMap<ChatId, Chat>,
    #[serde(default)]
    current_chat_id: Option<ChatId>,
}

/// Decode a raw text frame into a [`ServerMessage`].
///
/// The payload is decoded straight from the text (never through an
/// intermediate `Value`) so restore ordering survives.
pub fn parse_server_frame(text: &str) -> Result<ServerMessage, ProtocolError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let envelope: Envelope = serde_json::from_str(trimmed)?;
    let msg = match envelope.event.as_str() {
        EVENT_JOINED => {
            let Payload { data } = serde_json::from_str::<Payload<JoinedData>>(trimmed)?;
            ServerMessage::Joined {
                room_id: data.room_id,
                user_ids: data.user_ids,
            }
        }
        EVENT_CHAT_RESTORE => {
            let Payload { data } = serde_json::from_str::<Payload<RestoreData>>(trimmed)?;
            ServerMessage::ChatRestore {
                chats: data.chats,
                current_chat_id: data.current_chat_id,
            }
        }
        EVENT_CHAT_CLOSED => {
            let OptionalChatId { data } = serde_json::from_str(trimmed)?;
            ServerMessage::ChatClosed(data)
        }
        EVENT_INACTIVE => ServerMessage::Inactive,
        other => return Err(ProtocolError::UnknownEvent(other.to_string())),
    };
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Disconnect reasons
// ---------------------------------------------------------------------------

/// Why the transport went down.
///
/// Reason strings follow the socket.io vocabulary. Explicit reasons mean one
/// side closed on purpose and no recovery should be attempted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server closed the socket deliberately.
    ServerDisconnect,
    /// This client closed the socket deliberately.
    ClientDisconnect,
    PingTimeout,
    TransportClose,
    TransportError,
    ParseError,
    /// Unrecognised reason; treated as a transport failure.
    Other(String),
}

impl DisconnectReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "io server disconnect" => DisconnectReason::ServerDisconnect,
            "io client disconnect" => DisconnectReason::ClientDisconnect,
            "ping timeout" => DisconnectReason::PingTimeout,
            "transport close" => DisconnectReason::TransportClose,
            "transport error" => DisconnectReason::TransportError,
            "parse error" => DisconnectReason::ParseError,
            other => DisconnectReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DisconnectReason::ServerDisconnect => "io server disconnect",
            DisconnectReason::ClientDisconnect => "io client disconnect",
            DisconnectReason::PingTimeout => "ping timeout",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::ParseError => "parse error",
            DisconnectReason::Other(reason) => reason,
        }
    }

    /// `true` when either side closed intentionally.
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            DisconnectReason::ServerDisconnect | DisconnectReason::ClientDisconnect
        )
    }
}

impl From<&str> for DisconnectReason {
    fn from(reason: &str) -> Self {
        Self::parse(reason)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw reason string. See [`DisconnectReason::is_explicit`].
pub fn is_explicit_disconnection(reason: &str) -> bool {
    DisconnectReason::parse(reason).is_explicit()
}

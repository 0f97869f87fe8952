//! Core protocol types for Parlor's wire format.
//!
//! Inbound traffic is an [`Envelope`] (`{ "type": ..., "data": ... }`) that
//! is classified into a [`ClientRequest`]. Outbound traffic is a
//! [`ServerEvent`], serialized flat as `{ "type": ..., ...fields }`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short code that identifies a room, e.g. `"KQXZT"`.
///
/// Clients type this code in to join, so it travels as a plain string:
/// `#[serde(transparent)]` makes `RoomId("KQXZT")` serialize as `"KQXZT"`
/// rather than `{ "0": "KQXZT" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Envelope: the raw inbound shape
// ---------------------------------------------------------------------------

/// An inbound message before classification.
///
/// `data` is kept as an untyped JSON value on purpose. Classifying in two
/// steps lets the relay tell "I don't know this type" apart from "I know
/// this type but its fields are wrong", and the two are reported with
/// different error messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The request type, e.g. `"joinRoom"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific fields. Absent for requests that carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Reads the envelope out of any parsed JSON value.
    ///
    /// Only a `null` document is malformed. Any other value without a
    /// string `type` (a bare number, an array, an object missing the field)
    /// is a message of unknown type. A `null` `data` counts as absent.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidMessage`] for a `null` document.
    /// - [`ProtocolError::UnknownType`] when there is no string `type`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let mut object = match value {
            Value::Null => return Err(ProtocolError::InvalidMessage("null envelope".into())),
            Value::Object(object) => object,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        let kind = match object.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
            None => return Err(ProtocolError::UnknownType("<missing>".into())),
        };
        let data = object.remove("data").filter(|data| !data.is_null());
        Ok(Self { kind, data })
    }
}

// ---------------------------------------------------------------------------
// ClientRequest: typed inbound messages
// ---------------------------------------------------------------------------

/// A classified inbound request from a host or client connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Host → relay: open a new room with me as host.
    CreateRoom,

    /// Host → relay: close my room and evict everyone in it.
    DestroyRoom,

    /// Client → relay: join `room_id` under `name`.
    JoinRoom { room_id: RoomId, name: String },

    /// Any member → relay: deliver `message` to the member called
    /// `client_name` in my room.
    SendMessage { client_name: String, message: Value },

    /// Client → relay: deliver `message` to my room's host.
    SendToHost { message: Value },

    /// Host → relay: overwrite my room's phase.
    GameState { state: String },

    /// Client → relay: I'm leaving my room.
    LeaveRoom,

    /// Host → relay: the game begins.
    StartGame,
}

#[derive(Deserialize)]
struct JoinRoomData {
    #[serde(rename = "roomId")]
    room_id: RoomId,
    name: String,
}

#[derive(Deserialize)]
struct SendMessageData {
    client_name: String,
    message: Value,
}

#[derive(Deserialize)]
struct SendToHostData {
    message: Value,
}

#[derive(Deserialize)]
struct GameStateData {
    state: String,
}

impl ClientRequest {
    /// Decodes raw bytes into a request: first any JSON value, then the
    /// envelope, then the type-specific `data`.
    ///
    /// Bytes that are not JSON fail with [`ProtocolError::Decode`].
    pub fn decode(codec: &impl Codec, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = codec.decode(bytes)?;
        Self::from_envelope(Envelope::from_value(value)?)
    }

    /// Classifies a parsed envelope.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownType`] if `type` is not a known request.
    /// - [`ProtocolError::InvalidMessage`] / [`ProtocolError::Decode`] if the
    ///   request needs `data` and it is missing or malformed.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { kind, data } = envelope;
        let request = match kind.as_str() {
            "createRoom" => Self::CreateRoom,
            "destroyRoom" => Self::DestroyRoom,
            "leaveRoom" => Self::LeaveRoom,
            "startGame" => Self::StartGame,
            "joinRoom" => {
                let JoinRoomData { room_id, name } = fields(&kind, data)?;
                Self::JoinRoom { room_id, name }
            }
            "sendMessage" => {
                let SendMessageData { client_name, message } = fields(&kind, data)?;
                Self::SendMessage { client_name, message }
            }
            "sendToHost" => {
                let SendToHostData { message } = fields(&kind, data)?;
                Self::SendToHost { message }
            }
            "gameState" => {
                let GameStateData { state } = fields(&kind, data)?;
                Self::GameState { state }
            }
            _ => return Err(ProtocolError::UnknownType(kind)),
        };
        Ok(request)
    }

    /// The wire name of this request's type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom => "createRoom",
            Self::DestroyRoom => "destroyRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::SendMessage { .. } => "sendMessage",
            Self::SendToHost { .. } => "sendToHost",
            Self::GameState { .. } => "gameState",
            Self::LeaveRoom => "leaveRoom",
            Self::StartGame => "startGame",
        }
    }
}

fn fields<T: DeserializeOwned>(kind: &str, data: Option<Value>) -> Result<T, ProtocolError> {
    let data = data.ok_or_else(|| ProtocolError::InvalidMessage(format!("{kind} requires data")))?;
    serde_json::from_value(data).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// ServerEvent: outbound messages
// ---------------------------------------------------------------------------

/// A message the relay sends to a host or client.
///
/// Every event is flat: its fields sit next to `type`. Older hosts that
/// read `clientLeft` and `clientMessage` fields from a nested `data` object
/// must read them from the top level instead.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, and the two
/// `rename_all*` attributes give camelCase both for the tag and for field
/// names:
///   `ServerEvent::JoinedRoom { room_id, clients: 1 }`
///   → `{ "type": "joinedRoom", "roomId": "KQXZT", "clients": 1 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// → host: your room is open.
    RoomCreated { room_id: RoomId },

    /// → host and every client: the room is gone.
    RoomDestroyed,

    /// → joining client: you're in. `clients` is the room size after you.
    JoinedRoom { room_id: RoomId, clients: usize },

    /// → joining client: you took over your old slot in a running game.
    RejoinedRoom {
        room_id: RoomId,
        name: String,
        clients: usize,
    },

    /// → leaving client: you're out.
    LeftRoom { room_id: RoomId },

    /// → host: a client joined the lobby.
    ClientJoined { name: String },

    /// → host: a client left (or was dropped from) the room.
    ClientLeft { name: String },

    /// → host: a disconnected client came back on a new channel.
    RefreshClient { name: String },

    /// → host: a member sent you something. `name` is absent when the
    /// host sent it to itself.
    ClientMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        message: Value,
    },

    /// → host and every client: the game has started.
    GameStarted { room_id: RoomId },

    /// → the requester: something went wrong.
    Error { message: String },
}

impl ServerEvent {
    /// Builds an [`ServerEvent::Error`] from anything printable.
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

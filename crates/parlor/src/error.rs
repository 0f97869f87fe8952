//! Error types for the Parlor relay.

use parlor_protocol::ProtocolError;
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_transport::TransportError;

/// Top-level error for server setup and connection plumbing.
///
/// Requests the relay refuses are not `ParlorError`s: those are
/// [`RelayError`]s and go back to the requester as `error` events.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room registry error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A connection table error.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// An operation that only one role may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restricted {
    DestroyRoom,
    StartGame,
    SetGameState,
    LeaveRoom,
}

impl Restricted {
    fn required_role(self) -> &'static str {
        match self {
            Self::LeaveRoom => "client",
            Self::DestroyRoom | Self::StartGame | Self::SetGameState => "host",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::DestroyRoom => "destroy rooms",
            Self::StartGame => "start the game",
            Self::SetGameState => "set the game state",
            Self::LeaveRoom => "leave rooms",
        }
    }
}

/// A request the relay refused. Sent back to the requester as
/// `{ "type": "error", "message": <Display> }`, so the display strings are
/// part of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The requester does not hold the role the operation needs.
    #[error("Only {}s can {}", .0.required_role(), .0.description())]
    Unauthorized(Restricted),

    #[error("Room not found")]
    RoomNotFound,

    /// Another client in the lobby already uses this name.
    #[error("Name already in use")]
    NameInUse,

    /// The room is past the lobby and there is no disconnected slot with
    /// this name to take over.
    #[error("The game is currently running")]
    GameInProgress,

    /// No member of the sender's room has the target name.
    #[error("Target not found")]
    TargetNotFound,

    /// The requester has not created or joined a room.
    #[error("Connection not found")]
    ConnectionNotFound,

    /// The requester already created or joined a room.
    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Unknown message type")]
    UnknownMessageType,

    #[error("Invalid message format")]
    InvalidMessageFormat,
}

impl From<ProtocolError> for RelayError {
    fn from(err: ProtocolError) -> Self {
        if err.is_unknown_type() {
            Self::UnknownMessageType
        } else {
            Self::InvalidMessageFormat
        }
    }
}

impl From<RoomError> for RelayError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound(_) => Self::RoomNotFound,
        }
    }
}

impl From<SessionError> for RelayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyRegistered(_) => Self::AlreadyInRoom,
            SessionError::StillAlive(_) => Self::GameInProgress,
            SessionError::NotFound(_) | SessionError::NotAClient(_) => Self::ConnectionNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use parlor_protocol::RoomId;
    use parlor_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_unauthorized_messages() {
        assert_eq!(
            RelayError::Unauthorized(Restricted::DestroyRoom).to_string(),
            "Only hosts can destroy rooms"
        );
        assert_eq!(
            RelayError::Unauthorized(Restricted::StartGame).to_string(),
            "Only hosts can start the game"
        );
        assert_eq!(
            RelayError::Unauthorized(Restricted::SetGameState).to_string(),
            "Only hosts can set the game state"
        );
        assert_eq!(
            RelayError::Unauthorized(Restricted::LeaveRoom).to_string(),
            "Only clients can leave rooms"
        );
    }

    #[test]
    fn test_from_protocol_error_separates_unknown_type() {
        let unknown: RelayError = ProtocolError::UnknownType("fly".into()).into();
        assert_eq!(unknown, RelayError::UnknownMessageType);
        assert_eq!(unknown.to_string(), "Unknown message type");

        let invalid: RelayError = ProtocolError::InvalidMessage("no data".into()).into();
        assert_eq!(invalid, RelayError::InvalidMessageFormat);
        assert_eq!(invalid.to_string(), "Invalid message format");
    }

    #[test]
    fn test_from_room_and_session_errors() {
        let err: RelayError = RoomError::NotFound(RoomId::new("ABCDE")).into();
        assert_eq!(err, RelayError::RoomNotFound);

        let err: RelayError = SessionError::AlreadyRegistered(ConnectionId::new(1)).into();
        assert_eq!(err, RelayError::AlreadyInRoom);

        let err: RelayError = SessionError::StillAlive(ConnectionId::new(1)).into();
        assert_eq!(err, RelayError::GameInProgress);
    }

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let parlor_err: ParlorError = err.into();
        assert!(matches!(parlor_err, ParlorError::Transport(_)));
        assert!(parlor_err.to_string().contains("gone"));
    }
}

//! Room phase.

use std::fmt;

/// The lifecycle phase of a room.
///
/// ```text
/// Lobby ──(startGame)──→ Playing
/// ```
///
/// - **Lobby**: accepting new clients; names must be unique; a client that
///   drops is removed from the room.
/// - **Playing**: no new names; a client that drops keeps its slot so it
///   can take it over again from a new connection.
/// - **Custom**: any other phase a host sets through `gameState`. Rooms in
///   a custom phase follow the same join and disconnect rules as
///   `Playing`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoomPhase {
    #[default]
    Lobby,
    Playing,
    Custom(String),
}

impl RoomPhase {
    const LOBBY: &'static str = "LOBBY";
    const PLAYING: &'static str = "playing";

    /// Parses the phase strings hosts send in `gameState`.
    ///
    /// `"LOBBY"` and `"playing"` are the two canonical spellings; anything
    /// else is kept verbatim as [`RoomPhase::Custom`].
    pub fn from_wire(value: &str) -> Self {
        match value {
            Self::LOBBY => Self::Lobby,
            Self::PLAYING => Self::Playing,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// The wire spelling of this phase.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Lobby => Self::LOBBY,
            Self::Playing => Self::PLAYING,
            Self::Custom(value) => value,
        }
    }

    /// Returns `true` if the room is accepting new clients.
    pub fn is_lobby(&self) -> bool {
        matches!(self, Self::Lobby)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

//! Role records: what a connection is, and whether it is still there.

use std::time::{Duration, Instant};

use parlor_protocol::RoomId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a client slot that dropped during a game stays
    /// available for takeover before it is reclaimed.
    ///
    /// Default: 300 seconds. With 0, slots are reclaimed on the next sweep.
    pub reconnect_grace_secs: u64,
}

impl SessionConfig {
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Whether a client's channel is still open.
///
/// ```text
///   Alive ──(channel closes while playing)──→ Disconnected
///     ↑                                            │
///     └──(new channel joins with the same name)────┘
/// ```
///
/// The takeover arrow does not flip this record back: the old record is
/// replaced by a fresh `Alive` record keyed by the new channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The client's channel is open.
    Alive,

    /// The client's channel closed at `since`. The slot keeps its name
    /// and room membership.
    Disconnected { since: Instant },
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// The role a channel plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// The channel that created `room_id`.
    Host { room_id: RoomId },

    /// A channel that joined `room_id` as `name`. Names are unique only
    /// within a room.
    Client {
        room_id: RoomId,
        name: String,
        presence: Presence,
    },
}

impl Connection {
    /// The room this connection belongs to.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Host { room_id } | Self::Client { room_id, .. } => room_id,
        }
    }

    /// The client's name; hosts have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Host { .. } => None,
            Self::Client { name, .. } => Some(name),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host { .. })
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    /// `false` only for a client whose channel has dropped.
    pub fn is_alive(&self) -> bool {
        !matches!(
            self,
            Self::Client {
                presence: Presence::Disconnected { .. },
                ..
            }
        )
    }
}

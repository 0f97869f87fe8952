//! A single room's membership and phase.

use std::collections::HashSet;

use parlor_protocol::RoomId;
use parlor_transport::ConnectionId;

use crate::RoomPhase;

/// One room: exactly one host, an unordered set of clients, and a phase.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    host: ConnectionId,
    clients: HashSet<ConnectionId>,
    phase: RoomPhase,
}

impl Room {
    pub(crate) fn new(id: RoomId, host: ConnectionId) -> Self {
        Self {
            id,
            host,
            clients: HashSet::new(),
            phase: RoomPhase::Lobby,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// The connection that created the room.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    pub fn phase(&self) -> &RoomPhase {
        &self.phase
    }

    pub fn set_phase(&mut self, phase: RoomPhase) {
        self.phase = phase;
    }

    /// Adds a client. Returns `false` if it was already a member.
    pub fn add_client(&mut self, conn: ConnectionId) -> bool {
        self.clients.insert(conn)
    }

    /// Removes a client. Returns `false` if it was not a member.
    pub fn remove_client(&mut self, conn: ConnectionId) -> bool {
        self.clients.remove(&conn)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.clients.contains(&conn)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Iterates the client connections in no particular order.
    pub fn clients(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.clients.iter().copied()
    }
}

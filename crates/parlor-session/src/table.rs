//! The connection table: one role record per live channel.
//!
//! # Concurrency note
//!
//! `ConnectionTable` is not thread-safe by itself. It is owned by the
//! router, and the router is owned by the server behind a single mutex, so
//! every mutation already runs to completion before the next one starts.

use std::collections::HashMap;
use std::time::Instant;

use parlor_protocol::RoomId;
use parlor_transport::ConnectionId;

use crate::{Connection, Presence, SessionConfig, SessionError};

/// A client slot reclaimed by [`ConnectionTable::expire_stale`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredClient {
    pub conn: ConnectionId,
    pub room_id: RoomId,
    pub name: String,
}

/// All role records, keyed by channel.
///
/// ## Lifecycle of a client record
///
/// ```text
/// register_client() ──→ [Alive] ──→ mark_disconnected() ──→ [Disconnected]
///                          │                                    │      │
///                          ▼                                    │      ▼
///                       remove()            take_over(old, new) │  expire_stale()
///                                                  │            │
///                                                  ▼            ▼
///                                          new [Alive] record  (gone)
/// ```
#[derive(Debug)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
    config: SessionConfig,
}

impl ConnectionTable {
    /// Creates an empty table with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            connections: HashMap::new(),
            config,
        }
    }

    /// Records `conn` as the host of `room_id`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if `conn` already has a role.
    pub fn register_host(&mut self, conn: ConnectionId, room_id: RoomId) -> Result<(), SessionError> {
        self.insert_new(conn, Connection::Host { room_id })
    }

    /// Records `conn` as an alive client `name` of `room_id`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if `conn` already has a role.
    pub fn register_client(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        name: String,
    ) -> Result<(), SessionError> {
        self.insert_new(
            conn,
            Connection::Client {
                room_id,
                name,
                presence: Presence::Alive,
            },
        )
    }

    fn insert_new(&mut self, conn: ConnectionId, record: Connection) -> Result<(), SessionError> {
        if self.connections.contains_key(&conn) {
            return Err(SessionError::AlreadyRegistered(conn));
        }
        self.connections.insert(conn, record);
        Ok(())
    }

    /// Marks a client's channel as gone while keeping its slot.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if `conn` has no record.
    /// - [`SessionError::NotAClient`] if `conn` is a host.
    pub fn mark_disconnected(&mut self, conn: ConnectionId) -> Result<(), SessionError> {
        match self.connections.get_mut(&conn) {
            Some(Connection::Client { presence, .. }) => {
                *presence = Presence::Disconnected {
                    since: Instant::now(),
                };
                Ok(())
            }
            Some(Connection::Host { .. }) => Err(SessionError::NotAClient(conn)),
            None => Err(SessionError::NotFound(conn)),
        }
    }

    /// Moves a disconnected client's slot onto a new channel.
    ///
    /// The old record is removed and `new` gets an alive record with the
    /// same room and name.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyRegistered`] if `new` already has a role.
    /// - [`SessionError::NotFound`] / [`SessionError::NotAClient`] if `old`
    ///   is not a client record.
    /// - [`SessionError::StillAlive`] if `old` is still connected.
    pub fn take_over(&mut self, old: ConnectionId, new: ConnectionId) -> Result<(), SessionError> {
        if self.connections.contains_key(&new) {
            return Err(SessionError::AlreadyRegistered(new));
        }
        let (room_id, name) = match self.connections.get(&old) {
            Some(Connection::Client {
                presence: Presence::Alive,
                ..
            }) => return Err(SessionError::StillAlive(old)),
            Some(Connection::Client { room_id, name, .. }) => (room_id.clone(), name.clone()),
            Some(Connection::Host { .. }) => return Err(SessionError::NotAClient(old)),
            None => return Err(SessionError::NotFound(old)),
        };
        self.connections.remove(&old);
        self.register_client(new, room_id, name)
    }

    /// Finds the client called `name` among `members` of `room_id`.
    ///
    /// This is a linear scan, O(room size). Liveness is not considered: a
    /// disconnected slot still answers to its name.
    pub fn find_by_name(
        &self,
        members: impl IntoIterator<Item = ConnectionId>,
        room_id: &RoomId,
        name: &str,
    ) -> Option<ConnectionId> {
        members.into_iter().find(|conn| {
            matches!(
                self.connections.get(conn),
                Some(Connection::Client { room_id: r, name: n, .. }) if r == room_id && n == name
            )
        })
    }

    /// Removes and returns every client record that has been disconnected
    /// for at least the grace period.
    ///
    /// Callers are responsible for dropping the returned connections from
    /// their rooms.
    pub fn expire_stale(&mut self) -> Vec<ExpiredClient> {
        let grace = self.config.reconnect_grace();
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter_map(|(conn, record)| match record {
                Connection::Client {
                    presence: Presence::Disconnected { since },
                    ..
                } if since.elapsed() >= grace => Some(*conn),
                _ => None,
            })
            .collect();

        stale
            .into_iter()
            .filter_map(|conn| match self.connections.remove(&conn) {
                Some(Connection::Client { room_id, name, .. }) => {
                    tracing::info!(%conn, %room_id, name = %name, "disconnected slot expired");
                    Some(ExpiredClient { conn, room_id, name })
                }
                _ => None,
            })
            .collect()
    }

    /// Removes a record, returning it.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<Connection> {
        self.connections.remove(&conn)
    }

    /// Looks up a record by channel.
    pub fn get(&self, conn: ConnectionId) -> Option<&Connection> {
        self.connections.get(&conn)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// Iterates all records.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter().map(|(conn, record)| (*conn, record))
    }

    /// Returns the number of records (hosts and clients, any presence).
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

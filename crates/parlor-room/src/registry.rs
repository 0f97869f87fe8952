//! Room registry: creates, tracks, and destroys rooms.

use std::collections::HashMap;

use parlor_protocol::RoomId;
use parlor_transport::ConnectionId;
use rand::Rng;

use crate::{Room, RoomError, RoomPhase};

/// Length of generated room codes. 26^5 ≈ 11.8M codes.
const ROOM_CODE_LEN: usize = 5;

/// Owns every active room, keyed by room code.
///
/// Like the connection table, this is a plain `HashMap` with no locking of
/// its own. It is owned by the router, which is owned by the server behind
/// a single mutex.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new room in [`RoomPhase::Lobby`] with `host` as its host
    /// and no clients. Always succeeds.
    ///
    /// The code is random and re-drawn until it does not collide with a
    /// live room.
    pub fn create_room(&mut self, host: ConnectionId) -> RoomId {
        let room_id = loop {
            let candidate = generate_code();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        self.rooms
            .insert(room_id.clone(), Room::new(room_id.clone(), host));
        tracing::info!(%room_id, %host, "room created");
        room_id
    }

    /// Removes a room and returns it. Destroying an absent room is a no-op.
    ///
    /// Callers must notify and evict the members first; the registry only
    /// forgets the room.
    pub fn destroy_room(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id);
        if room.is_some() {
            tracing::info!(%room_id, "room destroyed");
        }
        room
    }

    /// Overwrites a room's phase.
    pub fn set_phase(&mut self, room_id: &RoomId, phase: RoomPhase) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        tracing::debug!(%room_id, from = %room.phase(), to = %phase, "room phase changed");
        room.set_phase(phase);
        Ok(())
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Iterates all rooms.
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Returns the number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Draws a random code of uppercase ASCII letters.
fn generate_code() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect();
    RoomId::new(code)
}

//! The router: every relay operation, from request to deliveries.
//!
//! The router owns the room registry, the connection table and the
//! outbound queues, and keeps them consistent with each other:
//!
//! - every room's host has a `Host` record naming that room;
//! - every member of a room's client set has a `Client` record naming that
//!   room, and every `Client` record is a member of its room;
//! - no record names a room that does not exist.
//!
//! It is a plain synchronous struct. The server keeps one behind a mutex,
//! so each operation runs to completion before the next starts. Nothing
//! here awaits: outbound events are pushed into per-connection queues and
//! written to the network by each connection's writer task.

use parlor_protocol::{ClientRequest, RoomId, ServerEvent};
use parlor_room::{RoomPhase, RoomRegistry};
use parlor_session::{Connection, ConnectionTable, ExpiredClient, SessionConfig};
use parlor_transport::ConnectionId;
use serde_json::Value;

use crate::error::{RelayError, Restricted};
use crate::outbox::{DeliverySender, Outbox};

/// How a successful `joinRoom` was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Joined a lobby. `clients` is the room size including the joiner.
    Joined { clients: usize },
    /// Took over a disconnected slot in a running game.
    Rejoined { clients: usize },
}

/// Coordinates rooms, role records and deliveries.
#[derive(Debug)]
pub struct Router {
    rooms: RoomRegistry,
    connections: ConnectionTable,
    outbox: Outbox,
}

impl Router {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            connections: ConnectionTable::new(config),
            outbox: Outbox::default(),
        }
    }

    /// Registers the outbound queue of a freshly accepted channel.
    ///
    /// A channel needs a queue to receive anything, but only gets a role
    /// record once it creates or joins a room.
    pub fn attach(&mut self, conn: ConnectionId, sender: DeliverySender) {
        self.outbox.attach(conn, sender);
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Runs one decoded request. A refusal is reported back to `conn` as
    /// an `error` event; it never affects other channels.
    pub fn handle(&mut self, conn: ConnectionId, request: ClientRequest) {
        let kind = request.kind();
        let result = match request {
            ClientRequest::CreateRoom => self.create_room(conn).map(drop),
            ClientRequest::DestroyRoom => self.destroy_room(conn),
            ClientRequest::JoinRoom { room_id, name } => {
                self.join_room(conn, &room_id, name).map(drop)
            }
            ClientRequest::SendMessage {
                client_name,
                message,
            } => self.send_message(conn, &client_name, message),
            ClientRequest::SendToHost { message } => self.send_to_host(conn, message),
            ClientRequest::GameState { state } => {
                self.set_game_state(conn, RoomPhase::from_wire(&state))
            }
            ClientRequest::LeaveRoom => self.leave_room(conn),
            ClientRequest::StartGame => self.start_game(conn),
        };

        if let Err(err) = result {
            tracing::debug!(%conn, request = kind, error = %err, "request refused");
            self.report(conn, &err);
        }
    }

    /// Sends `err` to `conn` as an `error` event.
    pub fn report(&self, conn: ConnectionId, err: &RelayError) {
        self.outbox.event(conn, ServerEvent::error(err));
    }

    // ---------------------------------------------------------------------
    // Host operations
    // ---------------------------------------------------------------------

    /// Opens a new room hosted by `conn`.
    pub fn create_room(&mut self, conn: ConnectionId) -> Result<RoomId, RelayError> {
        if self.connections.contains(conn) {
            return Err(RelayError::AlreadyInRoom);
        }

        let room_id = self.rooms.create_room(conn);
        if let Err(e) = self.connections.register_host(conn, room_id.clone()) {
            self.rooms.destroy_room(&room_id);
            return Err(e.into());
        }

        tracing::info!(%conn, %room_id, "room created");
        self.outbox.event(
            conn,
            ServerEvent::RoomCreated {
                room_id: room_id.clone(),
            },
        );
        Ok(room_id)
    }

    /// Closes the host's room and evicts every client in it.
    pub fn destroy_room(&mut self, conn: ConnectionId) -> Result<(), RelayError> {
        let room_id = self.hosted_room(conn, Restricted::DestroyRoom)?;
        self.tear_down(conn, &room_id);
        Ok(())
    }

    /// Moves the host's room to `Playing` and tells everyone.
    pub fn start_game(&mut self, conn: ConnectionId) -> Result<(), RelayError> {
        let room_id = self.hosted_room(conn, Restricted::StartGame)?;
        self.rooms.set_phase(&room_id, RoomPhase::Playing)?;

        let room = self.rooms.get(&room_id).ok_or(RelayError::RoomNotFound)?;
        let event = ServerEvent::GameStarted {
            room_id: room_id.clone(),
        };
        for client in room.clients() {
            self.outbox.event(client, event.clone());
        }
        self.outbox.event(conn, event);

        tracing::info!(%conn, %room_id, clients = room.client_count(), "game started");
        Ok(())
    }

    /// Overwrites the host's room phase. No acknowledgment.
    pub fn set_game_state(
        &mut self,
        conn: ConnectionId,
        phase: RoomPhase,
    ) -> Result<(), RelayError> {
        let room_id = self.hosted_room(conn, Restricted::SetGameState)?;
        tracing::debug!(%conn, %room_id, %phase, "game state set");
        self.rooms.set_phase(&room_id, phase)?;
        Ok(())
    }

    fn hosted_room(&self, conn: ConnectionId, action: Restricted) -> Result<RoomId, RelayError> {
        match self.connections.get(conn) {
            Some(Connection::Host { room_id }) => Ok(room_id.clone()),
            _ => Err(RelayError::Unauthorized(action)),
        }
    }

    /// Evicts every client, removes the room, and acknowledges the host.
    fn tear_down(&mut self, host: ConnectionId, room_id: &RoomId) {
        if let Some(room) = self.rooms.destroy_room(room_id) {
            for client in room.clients() {
                self.outbox.event(client, ServerEvent::RoomDestroyed);
                self.connections.remove(client);
                self.outbox.close(client);
            }
            tracing::info!(%host, %room_id, evicted = room.client_count(), "room destroyed");
        }
        self.connections.remove(host);
        self.outbox.event(host, ServerEvent::RoomDestroyed);
    }

    // ---------------------------------------------------------------------
    // Client operations
    // ---------------------------------------------------------------------

    /// Joins `room_id` as `name`, or takes over the disconnected slot
    /// called `name` if the game is already running.
    pub fn join_room(
        &mut self,
        conn: ConnectionId,
        room_id: &RoomId,
        name: String,
    ) -> Result<JoinOutcome, RelayError> {
        if self.connections.contains(conn) {
            return Err(RelayError::AlreadyInRoom);
        }
        let room = self.rooms.get(room_id).ok_or(RelayError::RoomNotFound)?;
        let existing = self.connections.find_by_name(room.clients(), room_id, &name);
        let host = room.host();

        if room.phase().is_lobby() {
            if existing.is_some() {
                return Err(RelayError::NameInUse);
            }
            self.connections
                .register_client(conn, room_id.clone(), name.clone())?;
            let room = self.rooms.get_mut(room_id).ok_or(RelayError::RoomNotFound)?;
            room.add_client(conn);
            let clients = room.client_count();

            tracing::info!(%conn, %room_id, name = %name, clients, "client joined");
            self.outbox.event(host, ServerEvent::ClientJoined { name });
            self.outbox.event(
                conn,
                ServerEvent::JoinedRoom {
                    room_id: room_id.clone(),
                    clients,
                },
            );
            return Ok(JoinOutcome::Joined { clients });
        }

        let old = match existing {
            Some(old) if self.connections.get(old).is_some_and(|c| !c.is_alive()) => old,
            _ => return Err(RelayError::GameInProgress),
        };
        self.connections.take_over(old, conn)?;
        let room = self.rooms.get_mut(room_id).ok_or(RelayError::RoomNotFound)?;
        room.remove_client(old);
        room.add_client(conn);
        let clients = room.client_count();

        tracing::info!(%conn, %old, %room_id, name = %name, "client rejoined");
        self.outbox
            .event(host, ServerEvent::RefreshClient { name: name.clone() });
        self.outbox.event(
            conn,
            ServerEvent::RejoinedRoom {
                room_id: room_id.clone(),
                name,
                clients,
            },
        );
        Ok(JoinOutcome::Rejoined { clients })
    }

    /// Leaves the client's room.
    pub fn leave_room(&mut self, conn: ConnectionId) -> Result<(), RelayError> {
        let (room_id, name) = match self.connections.get(conn) {
            Some(Connection::Client { room_id, name, .. }) => (room_id.clone(), name.clone()),
            _ => return Err(RelayError::Unauthorized(Restricted::LeaveRoom)),
        };
        self.connections.remove(conn);

        let Some(room) = self.rooms.get_mut(&room_id) else {
            tracing::debug!(%conn, %room_id, "dropped record of a vanished room");
            return Ok(());
        };
        room.remove_client(conn);
        let host = room.host();

        tracing::info!(%conn, %room_id, name = %name, "client left");
        self.outbox.event(host, ServerEvent::ClientLeft { name });
        self.outbox.event(conn, ServerEvent::LeftRoom { room_id });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Relaying
    // ---------------------------------------------------------------------

    /// Forwards `payload` verbatim to the client called `target` in the
    /// sender's room.
    ///
    /// A disconnected target still resolves by name. Its channel is gone,
    /// so the payload is dropped.
    pub fn send_message(
        &self,
        conn: ConnectionId,
        target: &str,
        payload: Value,
    ) -> Result<(), RelayError> {
        let record = self
            .connections
            .get(conn)
            .ok_or(RelayError::ConnectionNotFound)?;
        let room_id = record.room_id();
        let room = self.rooms.get(room_id).ok_or(RelayError::RoomNotFound)?;
        let target = self
            .connections
            .find_by_name(room.clients(), room_id, target)
            .ok_or(RelayError::TargetNotFound)?;

        self.outbox.forward(target, payload);
        Ok(())
    }

    /// Sends `payload` to the host of the sender's room, tagged with the
    /// sender's name.
    pub fn send_to_host(&self, conn: ConnectionId, payload: Value) -> Result<(), RelayError> {
        let record = self
            .connections
            .get(conn)
            .ok_or(RelayError::ConnectionNotFound)?;
        let room = self
            .rooms
            .get(record.room_id())
            .ok_or(RelayError::RoomNotFound)?;

        self.outbox.event(
            room.host(),
            ServerEvent::ClientMessage {
                name: record.name().map(str::to_owned),
                message: payload,
            },
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Channel lifecycle
    // ---------------------------------------------------------------------

    /// Handles the close of `conn`'s channel. Runs once per channel.
    ///
    /// | record              | effect                                  |
    /// |---------------------|-----------------------------------------|
    /// | host                | same as `destroy_room`                  |
    /// | client, lobby       | removed, host gets `clientLeft`         |
    /// | client, in game     | kept and marked disconnected            |
    /// | none                | nothing                                 |
    pub fn on_disconnect(&mut self, conn: ConnectionId) {
        self.outbox.detach(conn);

        let (room_id, name) = match self.connections.get(conn) {
            None => return,
            Some(Connection::Host { room_id }) => {
                let room_id = room_id.clone();
                tracing::info!(%conn, %room_id, "host disconnected");
                self.tear_down(conn, &room_id);
                return;
            }
            Some(Connection::Client { room_id, name, .. }) => (room_id.clone(), name.clone()),
        };

        let Some(room) = self.rooms.get_mut(&room_id) else {
            self.connections.remove(conn);
            return;
        };

        if room.phase().is_lobby() {
            room.remove_client(conn);
            let host = room.host();
            self.connections.remove(conn);
            tracing::info!(%conn, %room_id, name = %name, "client disconnected from lobby");
            self.outbox.event(host, ServerEvent::ClientLeft { name });
        } else if let Err(e) = self.connections.mark_disconnected(conn) {
            tracing::warn!(%conn, error = %e, "could not mark client disconnected");
        } else {
            tracing::info!(%conn, %room_id, name = %name, "client disconnected mid-game, slot kept");
        }
    }

    /// Reclaims client slots that stayed disconnected past the grace
    /// period. Each host is told `clientLeft`. Returns how many were
    /// reclaimed.
    pub fn expire_stale(&mut self) -> usize {
        let expired = self.connections.expire_stale();
        for ExpiredClient {
            conn,
            room_id,
            name,
        } in &expired
        {
            if let Some(room) = self.rooms.get_mut(room_id) {
                room.remove_client(*conn);
                self.outbox
                    .event(room.host(), ServerEvent::ClientLeft { name: name.clone() });
            }
        }
        expired.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::outbox::{Delivery, DeliveryReceiver};

    /// A router plus the receiving ends of every attached channel.
    struct Harness {
        router: Router,
        inboxes: HashMap<u64, DeliveryReceiver>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(SessionConfig::default())
        }

        fn with_config(config: SessionConfig) -> Self {
            Self {
                router: Router::new(config),
                inboxes: HashMap::new(),
            }
        }

        fn connect(&mut self, id: u64) -> ConnectionId {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = ConnectionId::new(id);
            self.router.attach(conn, tx);
            self.inboxes.insert(id, rx);
            conn
        }

        fn drain(&mut self, id: u64) -> Vec<Delivery> {
            let rx = self.inboxes.get_mut(&id).expect("unknown inbox");
            let mut out = Vec::new();
            while let Ok(delivery) = rx.try_recv() {
                out.push(delivery);
            }
            out
        }

        fn events(&mut self, id: u64) -> Vec<ServerEvent> {
            self.drain(id)
                .into_iter()
                .filter_map(|d| match d {
                    Delivery::Event(e) => Some(e),
                    _ => None,
                })
                .collect()
        }

        fn host_room(&mut self, id: u64) -> (ConnectionId, RoomId) {
            let host = self.connect(id);
            let room_id = self.router.create_room(host).unwrap();
            self.drain(id);
            (host, room_id)
        }

        fn join(&mut self, id: u64, room_id: &RoomId, name: &str) -> ConnectionId {
            let conn = self.connect(id);
            self.router.join_room(conn, room_id, name.into()).unwrap();
            conn
        }
    }

    fn error(err: RelayError) -> ServerEvent {
        ServerEvent::error(err)
    }

    /// Checks that role records and room membership agree.
    fn assert_invariants(router: &Router) {
        for room in router.rooms().iter() {
            match router.connections().get(room.host()) {
                Some(Connection::Host { room_id }) => assert_eq!(room_id, room.id()),
                other => panic!("host of {} has record {other:?}", room.id()),
            }
            for client in room.clients() {
                match router.connections().get(client) {
                    Some(Connection::Client { room_id, .. }) => assert_eq!(room_id, room.id()),
                    other => panic!("member {client} of {} has record {other:?}", room.id()),
                }
            }
        }
        for (conn, record) in router.connections().iter() {
            let room = router
                .rooms()
                .get(record.room_id())
                .unwrap_or_else(|| panic!("{conn} names missing room {}", record.room_id()));
            match record {
                Connection::Host { .. } => assert_eq!(room.host(), conn),
                Connection::Client { .. } => assert!(room.contains(conn)),
            }
        }
    }

    // --- create / destroy ---

    #[test]
    fn test_create_room_registers_host_and_acks() {
        let mut h = Harness::new();
        let host = h.connect(1);
        let room_id = h.router.create_room(host).unwrap();

        assert_eq!(h.events(1), vec![ServerEvent::RoomCreated { room_id: room_id.clone() }]);
        assert!(h.router.connections().get(host).unwrap().is_host());
        assert_eq!(h.router.rooms().get(&room_id).unwrap().host(), host);
        assert_invariants(&h.router);
    }

    #[test]
    fn test_create_room_twice_already_in_room() {
        let mut h = Harness::new();
        let (host, _) = h.host_room(1);

        assert_eq!(h.router.create_room(host), Err(RelayError::AlreadyInRoom));
        assert_eq!(h.router.rooms().len(), 1);
    }

    #[test]
    fn test_destroy_room_evicts_clients_and_acks_host() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.join(3, &room_id, "bob");
        h.drain(1);
        h.drain(2);

        h.router.destroy_room(host).unwrap();

        assert_eq!(
            h.drain(2),
            vec![Delivery::Event(ServerEvent::RoomDestroyed), Delivery::Close]
        );
        assert_eq!(
            h.drain(3),
            vec![
                Delivery::Event(ServerEvent::JoinedRoom { room_id: room_id.clone(), clients: 2 }),
                Delivery::Event(ServerEvent::RoomDestroyed),
                Delivery::Close,
            ]
        );
        assert_eq!(h.events(1), vec![ServerEvent::RoomDestroyed]);
        assert!(h.router.rooms().is_empty());
        assert!(h.router.connections().is_empty());
    }

    #[test]
    fn test_destroy_room_by_client_unauthorized() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let client = h.join(2, &room_id, "ann");

        let err = h.router.destroy_room(client).unwrap_err();
        assert_eq!(err.to_string(), "Only hosts can destroy rooms");
        assert!(h.router.rooms().contains(&room_id));
        assert_invariants(&h.router);
    }

    #[test]
    fn test_destroy_room_without_record_unauthorized() {
        let mut h = Harness::new();
        let stranger = h.connect(1);
        assert_eq!(
            h.router.destroy_room(stranger),
            Err(RelayError::Unauthorized(Restricted::DestroyRoom))
        );
    }

    // --- join ---

    #[test]
    fn test_join_room_lobby_acks_and_notifies_host() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let client = h.connect(2);

        let outcome = h.router.join_room(client, &room_id, "ann".into()).unwrap();

        assert_eq!(outcome, JoinOutcome::Joined { clients: 1 });
        assert_eq!(h.events(1), vec![ServerEvent::ClientJoined { name: "ann".into() }]);
        assert_eq!(
            h.events(2),
            vec![ServerEvent::JoinedRoom { room_id, clients: 1 }]
        );
        assert_invariants(&h.router);
    }

    #[test]
    fn test_join_room_duplicate_name_in_lobby_name_in_use() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        let other = h.connect(3);

        let err = h.router.join_room(other, &room_id, "ann".into()).unwrap_err();

        assert_eq!(err.to_string(), "Name already in use");
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 1);
        assert!(!h.router.connections().contains(other));
    }

    #[test]
    fn test_join_room_missing_room_not_found() {
        let mut h = Harness::new();
        let conn = h.connect(1);
        assert_eq!(
            h.router.join_room(conn, &RoomId::new("NOPE"), "ann".into()),
            Err(RelayError::RoomNotFound)
        );
    }

    #[test]
    fn test_join_room_host_already_in_room() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        assert_eq!(
            h.router.join_room(host, &room_id, "me".into()),
            Err(RelayError::AlreadyInRoom)
        );
    }

    #[test]
    fn test_join_room_same_name_other_room_ok() {
        let mut h = Harness::new();
        let (_, first) = h.host_room(1);
        let (_, second) = h.host_room(2);
        h.join(3, &first, "ann");
        h.join(4, &second, "ann");
        assert_invariants(&h.router);
    }

    #[test]
    fn test_join_room_playing_new_name_game_in_progress() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.router.start_game(host).unwrap();
        let late = h.connect(3);

        let err = h.router.join_room(late, &room_id, "zed".into()).unwrap_err();
        assert_eq!(err.to_string(), "The game is currently running");
    }

    #[test]
    fn test_join_room_playing_alive_name_game_in_progress() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.router.start_game(host).unwrap();
        let impostor = h.connect(3);

        assert_eq!(
            h.router.join_room(impostor, &room_id, "ann".into()),
            Err(RelayError::GameInProgress)
        );
    }

    #[test]
    fn test_join_room_playing_disconnected_name_takes_over() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let old = h.join(2, &room_id, "ann");
        h.join(3, &room_id, "bob");
        h.router.start_game(host).unwrap();
        h.router.on_disconnect(old);
        h.drain(1);

        let new = h.connect(4);
        let outcome = h.router.join_room(new, &room_id, "ann".into()).unwrap();

        assert_eq!(outcome, JoinOutcome::Rejoined { clients: 2 });
        assert_eq!(h.events(1), vec![ServerEvent::RefreshClient { name: "ann".into() }]);
        assert_eq!(
            h.events(4),
            vec![ServerEvent::RejoinedRoom {
                room_id: room_id.clone(),
                name: "ann".into(),
                clients: 2,
            }]
        );
        let room = h.router.rooms().get(&room_id).unwrap();
        assert!(room.contains(new));
        assert!(!room.contains(old));
        assert!(!h.router.connections().contains(old));
        let anns: Vec<_> = h
            .router
            .connections()
            .iter()
            .filter(|(_, c)| c.name() == Some("ann"))
            .collect();
        assert_eq!(anns.len(), 1);
        assert!(anns[0].1.is_alive());
        assert_invariants(&h.router);
    }

    #[test]
    fn test_join_room_custom_phase_follows_playing_rules() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let old = h.join(2, &room_id, "ann");
        h.router
            .set_game_state(host, RoomPhase::from_wire("round-2"))
            .unwrap();
        h.router.on_disconnect(old);

        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 1);
        let late = h.connect(3);
        assert_eq!(
            h.router.join_room(late, &room_id, "zed".into()),
            Err(RelayError::GameInProgress)
        );
        let new = h.connect(4);
        assert!(matches!(
            h.router.join_room(new, &room_id, "ann".into()),
            Ok(JoinOutcome::Rejoined { clients: 1 })
        ));
    }

    // --- leave ---

    #[test]
    fn test_leave_room_notifies_host_and_acks() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let client = h.join(2, &room_id, "ann");
        h.drain(1);
        h.drain(2);

        h.router.leave_room(client).unwrap();

        assert_eq!(h.events(1), vec![ServerEvent::ClientLeft { name: "ann".into() }]);
        assert_eq!(h.events(2), vec![ServerEvent::LeftRoom { room_id: room_id.clone() }]);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 0);
        assert!(!h.router.connections().contains(client));
        assert_invariants(&h.router);
    }

    #[test]
    fn test_leave_room_then_rejoin_lobby_ok() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let client = h.join(2, &room_id, "ann");
        h.router.leave_room(client).unwrap();

        assert!(h.router.join_room(client, &room_id, "ann".into()).is_ok());
    }

    #[test]
    fn test_leave_room_by_host_unauthorized() {
        let mut h = Harness::new();
        let (host, _) = h.host_room(1);

        let err = h.router.leave_room(host).unwrap_err();
        assert_eq!(err.to_string(), "Only clients can leave rooms");
    }

    // --- relaying ---

    #[test]
    fn test_send_message_forwards_payload_verbatim() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.drain(2);
        let payload = json!({"type": "prompt", "text": "draw a cat"});

        h.router.send_message(host, "ann", payload.clone()).unwrap();

        assert_eq!(h.drain(2), vec![Delivery::Forward(payload)]);
        assert!(h.drain(1).is_empty());
    }

    #[test]
    fn test_send_message_client_to_client_ok() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.join(3, &room_id, "bob");
        h.drain(3);

        h.router.send_message(ann, "bob", json!(42)).unwrap();
        assert_eq!(h.drain(3), vec![Delivery::Forward(json!(42))]);
    }

    #[test]
    fn test_send_message_unknown_target_not_found() {
        let mut h = Harness::new();
        let (host, _) = h.host_room(1);

        let err = h.router.send_message(host, "ghost", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Target not found");
    }

    #[test]
    fn test_send_message_other_room_target_not_found() {
        let mut h = Harness::new();
        let (host, _) = h.host_room(1);
        let (_, other_room) = h.host_room(2);
        h.join(3, &other_room, "ann");

        assert_eq!(
            h.router.send_message(host, "ann", json!({})),
            Err(RelayError::TargetNotFound)
        );
    }

    #[test]
    fn test_send_message_disconnected_target_resolves_and_drops() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.router.start_game(host).unwrap();
        h.router.on_disconnect(ann);
        h.drain(2);

        assert!(h.router.send_message(host, "ann", json!("hi")).is_ok());
        assert!(h.drain(2).is_empty());
    }

    #[test]
    fn test_send_message_without_record_connection_not_found() {
        let mut h = Harness::new();
        let stranger = h.connect(1);
        assert_eq!(
            h.router.send_message(stranger, "ann", json!({})),
            Err(RelayError::ConnectionNotFound)
        );
    }

    #[test]
    fn test_send_to_host_tags_sender_name() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.drain(1);

        h.router.send_to_host(ann, json!({"answer": 7})).unwrap();

        assert_eq!(
            h.events(1),
            vec![ServerEvent::ClientMessage {
                name: Some("ann".into()),
                message: json!({"answer": 7}),
            }]
        );
    }

    #[test]
    fn test_send_to_host_from_host_omits_name() {
        let mut h = Harness::new();
        let (host, _) = h.host_room(1);

        h.router.send_to_host(host, json!("note")).unwrap();

        assert_eq!(
            h.events(1),
            vec![ServerEvent::ClientMessage {
                name: None,
                message: json!("note"),
            }]
        );
    }

    #[test]
    fn test_send_to_host_without_record_connection_not_found() {
        let mut h = Harness::new();
        let stranger = h.connect(1);
        assert_eq!(
            h.router.send_to_host(stranger, json!({})),
            Err(RelayError::ConnectionNotFound)
        );
    }

    // --- game phase ---

    #[test]
    fn test_start_game_broadcasts_and_echoes() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.join(3, &room_id, "bob");
        h.drain(1);
        h.drain(2);
        h.drain(3);

        h.router.start_game(host).unwrap();

        let started = ServerEvent::GameStarted { room_id: room_id.clone() };
        assert_eq!(h.events(1), vec![started.clone()]);
        assert_eq!(h.events(2), vec![started.clone()]);
        assert_eq!(h.events(3), vec![started]);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().phase(), &RoomPhase::Playing);
    }

    #[test]
    fn test_start_game_by_client_unauthorized() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");

        let err = h.router.start_game(ann).unwrap_err();
        assert_eq!(err.to_string(), "Only hosts can start the game");
        assert!(h.router.rooms().get(&room_id).unwrap().phase().is_lobby());
    }

    #[test]
    fn test_set_game_state_back_to_lobby_reopens_joins() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.router.start_game(host).unwrap();
        h.drain(1);

        h.router.set_game_state(host, RoomPhase::from_wire("LOBBY")).unwrap();

        assert!(h.events(1).is_empty());
        h.join(2, &room_id, "ann");
    }

    #[test]
    fn test_set_game_state_by_client_unauthorized() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");

        assert_eq!(
            h.router.set_game_state(ann, RoomPhase::Playing),
            Err(RelayError::Unauthorized(Restricted::SetGameState))
        );
    }

    // --- disconnect ---

    #[test]
    fn test_on_disconnect_lobby_client_removed() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.drain(1);

        h.router.on_disconnect(ann);

        assert_eq!(h.events(1), vec![ServerEvent::ClientLeft { name: "ann".into() }]);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 0);
        assert!(!h.router.connections().contains(ann));
        assert_invariants(&h.router);
    }

    #[test]
    fn test_on_disconnect_playing_client_slot_kept() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.router.start_game(host).unwrap();
        h.drain(1);

        h.router.on_disconnect(ann);

        assert!(h.events(1).is_empty());
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 1);
        let record = h.router.connections().get(ann).unwrap();
        assert!(!record.is_alive());
        assert_invariants(&h.router);
    }

    #[test]
    fn test_on_disconnect_host_destroys_room() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.drain(1);
        h.drain(2);

        h.router.on_disconnect(host);

        assert_eq!(
            h.drain(2),
            vec![Delivery::Event(ServerEvent::RoomDestroyed), Delivery::Close]
        );
        // The host's own queue was detached before the teardown.
        assert!(h.drain(1).is_empty());
        assert!(h.router.rooms().is_empty());
        assert!(h.router.connections().is_empty());
    }

    #[test]
    fn test_on_disconnect_unknown_is_noop() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        let stranger = h.connect(9);

        h.router.on_disconnect(stranger);

        assert!(h.router.rooms().contains(&room_id));
        assert_eq!(h.router.connections().len(), 1);
    }

    #[test]
    fn test_on_disconnect_evicted_client_is_noop() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.router.destroy_room(host).unwrap();

        h.router.on_disconnect(ann);
        assert!(h.router.connections().is_empty());
    }

    // --- expiry ---

    #[test]
    fn test_expire_stale_reclaims_slot_and_notifies_host() {
        let mut h = Harness::with_config(SessionConfig {
            reconnect_grace_secs: 0,
        });
        let (host, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.join(3, &room_id, "bob");
        h.router.start_game(host).unwrap();
        h.router.on_disconnect(ann);
        h.drain(1);

        assert_eq!(h.router.expire_stale(), 1);

        assert_eq!(h.events(1), vec![ServerEvent::ClientLeft { name: "ann".into() }]);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 1);
        assert_invariants(&h.router);

        let late = h.connect(4);
        assert_eq!(
            h.router.join_room(late, &room_id, "ann".into()),
            Err(RelayError::GameInProgress)
        );
    }

    #[test]
    fn test_expire_stale_within_grace_keeps_slot() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);
        let ann = h.join(2, &room_id, "ann");
        h.router.start_game(host).unwrap();
        h.router.on_disconnect(ann);

        assert_eq!(h.router.expire_stale(), 0);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 1);
    }

    // --- dispatch ---

    #[test]
    fn test_handle_reports_refusal_to_requester() {
        let mut h = Harness::new();
        let (_, room_id) = h.host_room(1);
        h.join(2, &room_id, "ann");
        h.drain(1);
        let other = h.connect(3);

        h.router.handle(
            other,
            ClientRequest::JoinRoom {
                room_id,
                name: "ann".into(),
            },
        );

        assert_eq!(h.events(3), vec![error(RelayError::NameInUse)]);
        assert!(h.events(1).is_empty());
    }

    #[test]
    fn test_handle_game_state_parses_phase() {
        let mut h = Harness::new();
        let (host, room_id) = h.host_room(1);

        h.router.handle(
            host,
            ClientRequest::GameState {
                state: "playing".into(),
            },
        );

        assert_eq!(h.router.rooms().get(&room_id).unwrap().phase(), &RoomPhase::Playing);
        assert!(h.events(1).is_empty());
    }

    #[test]
    fn test_handle_full_session_keeps_invariants() {
        let mut h = Harness::new();
        let host = h.connect(1);
        h.router.handle(host, ClientRequest::CreateRoom);
        let room_id = match h.events(1).as_slice() {
            [ServerEvent::RoomCreated { room_id }] => room_id.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_invariants(&h.router);

        for (id, name) in [(2, "ann"), (3, "bob"), (4, "cat")] {
            let conn = h.connect(id);
            h.router.handle(
                conn,
                ClientRequest::JoinRoom {
                    room_id: room_id.clone(),
                    name: name.into(),
                },
            );
            assert_invariants(&h.router);
        }

        h.router.handle(ConnectionId::new(3), ClientRequest::LeaveRoom);
        assert_invariants(&h.router);
        h.router.handle(host, ClientRequest::StartGame);
        assert_invariants(&h.router);
        h.router.on_disconnect(ConnectionId::new(2));
        assert_invariants(&h.router);

        let back = h.connect(5);
        h.router.handle(
            back,
            ClientRequest::JoinRoom {
                room_id: room_id.clone(),
                name: "ann".into(),
            },
        );
        assert_invariants(&h.router);
        assert_eq!(h.router.rooms().get(&room_id).unwrap().client_count(), 2);

        h.router.handle(host, ClientRequest::DestroyRoom);
        assert_invariants(&h.router);
        assert!(h.router.connections().is_empty());
    }
}

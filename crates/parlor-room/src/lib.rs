//! Room registry for Parlor.
//!
//! A room is one host, any number of named clients, and a phase. The
//! registry owns every room and hands out fresh room codes; it knows
//! connections only by [`ConnectionId`](parlor_transport::ConnectionId) and
//! never looks at what role a connection claims. Keeping role records in
//! sync with room membership is the router's job.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, allocates room codes
//! - [`Room`]: membership and phase of a single room
//! - [`RoomPhase`]: lifecycle phase (`Lobby` → `Playing`)

mod error;
mod phase;
mod registry;
mod room;

pub use error::RoomError;
pub use phase::RoomPhase;
pub use registry::RoomRegistry;
pub use room::Room;

//! Connection role records for Parlor.
//!
//! Every live channel that has created or joined a room has exactly one
//! record here saying what it is:
//!
//! 1. **Roles**: a [`Connection`] is either the host of a room or a named
//!    client in it. The two are separate variants, so a host with a name
//!    cannot be represented.
//! 2. **Presence**: a client whose channel dropped mid-game keeps its
//!    record, marked [`Presence::Disconnected`], so a new channel can take
//!    the slot over by name.
//! 3. **Expiry**: slots that stay disconnected past the configured grace
//!    period are reclaimed ([`ConnectionTable::expire_stale`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)  ← combines role records with room membership
//!     ↕
//! Session layer (this crate)  ← who is who, and who is still there
//!     ↕
//! Transport / Protocol (below)  ← ConnectionId, RoomId
//! ```

mod connection;
mod error;
mod table;

pub use connection::{Connection, Presence, SessionConfig};
pub use error::SessionError;
pub use table::{ConnectionTable, ExpiredClient};

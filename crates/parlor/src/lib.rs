//! # Parlor
//!
//! A relay server for party games played on one shared screen.
//!
//! One connection, the **host**, creates a room and gets a short room code.
//! Players join that room from their own devices as named **clients**. The
//! relay then only routes JSON between them: the host talks to clients by
//! name, clients talk to the host, and the game logic lives entirely on the
//! host. Clients that drop out mid-game can come back from a new connection
//! under the same name and take their slot over.
//!
//! ## Layers
//!
//! ```text
//! parlor-transport   WebSocket accept/send/recv, ConnectionId
//! parlor-protocol    {type,data} requests, events, JSON codec
//! parlor-room        RoomRegistry, Room, RoomPhase
//! parlor-session     ConnectionTable: host/client records, presence
//! parlor (this)      Router, per-connection handler, server, sweeper
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parlor::prelude::*;
//!
//! # async fn run() -> Result<(), ParlorError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
pub mod outbox;
mod router;
mod server;

pub use error::{ParlorError, RelayError, Restricted};
pub use router::{JoinOutcome, Router};
pub use server::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, RelayServer, RelayServerBuilder,
};

/// Everything needed to build and run a relay, or drive a [`Router`]
/// directly.
pub mod prelude {
    pub use crate::outbox::{Delivery, DeliveryReceiver, DeliverySender};
    pub use crate::{
        JoinOutcome, ParlorError, RelayError, RelayServer, RelayServerBuilder, Restricted, Router,
    };
    pub use parlor_protocol::{ClientRequest, RoomId, ServerEvent};
    pub use parlor_room::RoomPhase;
    pub use parlor_session::SessionConfig;
    pub use parlor_transport::ConnectionId;
}

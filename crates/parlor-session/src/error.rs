//! Error types for the session layer.

use parlor_transport::ConnectionId;

/// Errors that can occur while updating role records.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection already has a role. One room per connection.
    #[error("{0} already has a role")]
    AlreadyRegistered(ConnectionId),

    /// No record exists for the connection.
    #[error("no record for {0}")]
    NotFound(ConnectionId),

    /// The operation only applies to clients and the record is a host.
    #[error("{0} is not a client")]
    NotAClient(ConnectionId),

    /// A takeover targeted a slot whose owner is still connected.
    #[error("{0} is still connected")]
    StillAlive(ConnectionId),
}

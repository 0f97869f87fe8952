//! Per-connection outbound queues.
//!
//! The router never touches a socket. It pushes [`Delivery`] values into
//! an unbounded channel per connection, and that connection's writer task
//! drains the channel onto the wire. Pushing never blocks, so the router
//! can run an entire operation while holding the server lock.

use std::collections::HashMap;

use parlor_protocol::ServerEvent;
use parlor_transport::ConnectionId;
use serde_json::Value;
use tokio::sync::mpsc;

/// One item for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A relay event, encoded by the server's codec.
    Event(ServerEvent),
    /// A payload relayed from another member, sent as-is.
    Forward(Value),
    /// Close the channel after everything queued before it.
    Close,
}

/// Sending half of a connection's delivery queue.
pub type DeliverySender = mpsc::UnboundedSender<Delivery>;

/// Receiving half, owned by the connection's writer task.
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

/// The open delivery queues, keyed by connection.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    channels: HashMap<ConnectionId, DeliverySender>,
}

impl Outbox {
    pub(crate) fn attach(&mut self, conn: ConnectionId, sender: DeliverySender) {
        self.channels.insert(conn, sender);
    }

    /// Drops the queue. The writer task ends once it has drained it.
    pub(crate) fn detach(&mut self, conn: ConnectionId) {
        self.channels.remove(&conn);
    }

    pub(crate) fn event(&self, conn: ConnectionId, event: ServerEvent) {
        self.push(conn, Delivery::Event(event));
    }

    pub(crate) fn forward(&self, conn: ConnectionId, payload: Value) {
        self.push(conn, Delivery::Forward(payload));
    }

    /// Queues a close and detaches, so nothing can be queued after it.
    pub(crate) fn close(&mut self, conn: ConnectionId) {
        self.push(conn, Delivery::Close);
        self.detach(conn);
    }

    /// Fire-and-forget: a missing or closed queue means the peer is gone.
    fn push(&self, conn: ConnectionId, delivery: Delivery) {
        match self.channels.get(&conn) {
            Some(sender) => {
                if sender.send(delivery).is_err() {
                    tracing::debug!(%conn, "writer gone, delivery dropped");
                }
            }
            None => tracing::debug!(%conn, "no open channel, delivery dropped"),
        }
    }
}
